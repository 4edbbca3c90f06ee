//! Configuration traits and utilities.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;

use sensors2mqtt_common::{DEFAULT_DISCOVERY_PREFIX, load_config};
use sensors2mqtt_common::topic::validate_topic_prefix;

use crate::args::BridgeArgs;
use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// loading from an optional JSON5 file, CLI/environment overrides, validation,
/// and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use sensors2mqtt_bridge_framework::{BridgeConfig, LoggingConfig, MqttConfig};
///
/// #[derive(Debug, Default, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
///     pub root_topic: String,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn mqtt_mut(&mut self) -> &mut MqttConfig {
///         &mut self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn root_topic(&self) -> &str {
///         &self.root_topic
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned + Default {
    /// Get the MQTT configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the MQTT configuration for overriding.
    fn mqtt_mut(&mut self) -> &mut MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the root topic for this bridge.
    fn root_topic(&self) -> &str;

    /// Topic prefix Home Assistant listens on for discovery.
    fn discovery_prefix(&self) -> &str {
        DEFAULT_DISCOVERY_PREFIX
    }

    /// How long shutdown may wait for the offline availability acknowledgment.
    fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Validate bridge-specific settings.
    ///
    /// Called by [`check`](Self::check) after the common settings passed.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Validate common and bridge-specific settings.
    fn check(&self) -> Result<()> {
        self.mqtt().validate()?;
        validate_topic_prefix(self.root_topic())?;
        validate_topic_prefix(self.discovery_prefix())?;
        self.validate()
    }

    /// Apply CLI/environment overrides.
    fn apply_args(&mut self, args: &BridgeArgs) {
        let mqtt = self.mqtt_mut();
        if let Some(url) = &args.mqtt_url {
            mqtt.url = Some(url.clone());
        }
        if let Some(username) = &args.mqtt_username {
            mqtt.username = Some(username.clone());
        }
        if let Some(password) = &args.mqtt_password {
            mqtt.password = Some(password.clone());
        }
    }

    /// Load configuration from a file path without validating it.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        load_config(path).map_err(|e| BridgeError::ConfigParse(e.to_string()))
    }

    /// Build the effective configuration.
    ///
    /// Starts from the `--config` file when given (defaults otherwise), applies
    /// the common CLI/environment overrides, then `overrides` for the
    /// bridge's own flags, then runs [`check`](Self::check).
    fn resolve(args: &BridgeArgs, overrides: impl FnOnce(&mut Self)) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        config.apply_args(args);
        overrides(&mut config);
        config.check()?;

        Ok(config)
    }
}
