//! Configuration for the sensors bridge.

use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sensors2mqtt_bridge_framework::{
    BridgeArgs, BridgeConfig, BridgeError, LoggingConfig, MqttConfig, Source,
};
use sensors2mqtt_common::{DEFAULT_DISCOVERY_PREFIX, DEFAULT_ROOT_TOPIC};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation(msg) => BridgeError::ConfigValidation(msg),
        }
    }
}

/// Command line of the sensors bridge.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "sensors2mqtt", version, about)]
pub struct SensorsArgs {
    #[command(flatten)]
    pub bridge: BridgeArgs,

    /// Root topic for availability and readings.
    #[arg(long, env = "MQTT_TOPIC")]
    pub topic: Option<String>,

    /// Poll interval in milliseconds.
    #[arg(long, env = "INTERVAL")]
    pub interval: Option<u64>,
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorsBridgeConfig {
    /// MQTT connection settings.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Polling and publishing settings.
    #[serde(default)]
    pub sensors: SensorsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Polling and publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Root topic (default: "sensors2mqtt").
    #[serde(default = "default_root_topic")]
    pub root_topic: String,

    /// Home Assistant discovery prefix (default: "homeassistant").
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    /// Poll interval in milliseconds (default: 10000).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Host name reported as the lm-sensors device model.
    /// Use "auto" to detect automatically (default).
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// How long shutdown waits for the offline acknowledgment (default: 5000).
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// lm-sensors source.
    #[serde(default)]
    pub lm_sensors: SourceConfig,

    /// nvidia-smi source.
    #[serde(default)]
    pub nvidia_smi: SourceConfig,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            root_topic: default_root_topic(),
            discovery_prefix: default_discovery_prefix(),
            interval_ms: default_interval_ms(),
            hostname: default_hostname(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            lm_sensors: SourceConfig::default(),
            nvidia_smi: SourceConfig::default(),
        }
    }
}

fn default_root_topic() -> String {
    DEFAULT_ROOT_TOPIC.to_string()
}

fn default_discovery_prefix() -> String {
    DEFAULT_DISCOVERY_PREFIX.to_string()
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_hostname() -> String {
    "auto".to_string()
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

/// Settings of one reading source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Poll this source (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Program to run instead of the default tool.
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments replacing the default ones.
    #[serde(default)]
    pub args: Option<Vec<String>>,

    /// Kill the tool after this many seconds (default: 10).
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
            args: None,
            timeout_secs: default_source_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_source_timeout() -> u64 {
    10
}

impl SourceConfig {
    /// Tool timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SensorsConfig {
    /// Poll interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Settings of a source.
    pub fn source(&self, source: Source) -> &SourceConfig {
        match source {
            Source::LmSensors => &self.lm_sensors,
            Source::NvidiaSmi => &self.nvidia_smi,
        }
    }
}

impl SensorsBridgeConfig {
    /// Build the effective configuration from the command line.
    ///
    /// Precedence is flag, then environment, then the `--config` file, then defaults.
    pub fn from_args(args: &SensorsArgs) -> Result<Self, BridgeError> {
        Self::resolve(&args.bridge, |config: &mut Self| {
            if let Some(topic) = &args.topic {
                config.sensors.root_topic = topic.clone();
            }
            if let Some(interval) = args.interval {
                config.sensors.interval_ms = interval;
            }
        })
    }

    /// Validate the sensors settings.
    pub fn validate_sensors(&self) -> Result<(), ConfigError> {
        if self.sensors.interval_ms == 0 {
            return Err(ConfigError::Validation("interval must be > 0".to_string()));
        }

        if self.sensors.shutdown_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "shutdown_timeout_ms must be > 0".to_string(),
            ));
        }

        for source in [Source::LmSensors, Source::NvidiaSmi] {
            let config = self.sensors.source(source);
            if config.timeout_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "{source}: timeout_secs must be > 0"
                )));
            }
            if config.command.as_deref().is_some_and(|c| c.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "{source}: command must not be empty"
                )));
            }
        }

        if !self.sensors.lm_sensors.enabled && !self.sensors.nvidia_smi.enabled {
            return Err(ConfigError::Validation(
                "At least one source must be enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the hostname to use, resolving "auto" if needed.
    pub fn get_hostname(&self) -> String {
        if self.sensors.hostname == "auto" {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string())
        } else {
            self.sensors.hostname.clone()
        }
    }
}

impl BridgeConfig for SensorsBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn mqtt_mut(&mut self) -> &mut MqttConfig {
        &mut self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn root_topic(&self) -> &str {
        &self.sensors.root_topic
    }

    fn discovery_prefix(&self) -> &str {
        &self.sensors.discovery_prefix
    }

    fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.sensors.shutdown_timeout_ms)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        Ok(self.validate_sensors()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensors2mqtt_common::parse_config;

    fn args(extra: &[&str]) -> SensorsArgs {
        let mut argv = vec!["sensors2mqtt"];
        argv.extend_from_slice(extra);
        SensorsArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: SensorsBridgeConfig =
            parse_config(r#"{ mqtt: { url: "mqtt://localhost" } }"#).unwrap();
        config.check().unwrap();

        assert_eq!(config.sensors.root_topic, "sensors2mqtt");
        assert_eq!(config.sensors.discovery_prefix, "homeassistant");
        assert_eq!(config.sensors.interval(), Duration::from_secs(10));
        assert_eq!(config.sensors.hostname, "auto");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert!(config.sensors.lm_sensors.enabled);
        assert!(config.sensors.nvidia_smi.command.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            mqtt: {
                url: "mqtts://broker.lan",
                username: "ha",
                password: "secret",
                client_id: "desk-sensors",
            },
            sensors: {
                root_topic: "desk",
                discovery_prefix: "ha",
                interval_ms: 30000,
                hostname: "desk",
                nvidia_smi: { enabled: false },
                lm_sensors: {
                    command: "/usr/local/bin/sensors",
                    args: ["-j", "-A"],
                    timeout_secs: 3,
                },
            },
            logging: { level: "debug", format: "json" },
        }"#;

        let config: SensorsBridgeConfig = parse_config(json).unwrap();
        config.check().unwrap();

        assert_eq!(config.root_topic(), "desk");
        assert_eq!(config.discovery_prefix(), "ha");
        assert_eq!(config.get_hostname(), "desk");
        assert!(!config.sensors.source(Source::NvidiaSmi).enabled);
        assert_eq!(
            config.sensors.lm_sensors.args.as_deref(),
            Some(&["-j".to_string(), "-A".to_string()][..])
        );
        assert_eq!(config.sensors.lm_sensors.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = args(&[
            "--mqtt-url",
            "mqtt://broker.lan:1884",
            "--topic",
            "office",
            "--interval",
            "2500",
        ]);
        let config = SensorsBridgeConfig::from_args(&args).unwrap();

        assert_eq!(config.mqtt.url.as_deref(), Some("mqtt://broker.lan:1884"));
        assert_eq!(config.sensors.root_topic, "office");
        assert_eq!(config.sensors.interval_ms, 2500);
    }

    #[test]
    fn test_validate_zero_interval() {
        let args = args(&["--mqtt-url", "mqtt://localhost", "--interval", "0"]);
        assert!(matches!(
            SensorsBridgeConfig::from_args(&args),
            Err(BridgeError::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_validate_wildcard_topic() {
        let args = args(&["--mqtt-url", "mqtt://localhost", "--topic", "sensors/#"]);
        assert!(SensorsBridgeConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let args = args(&["--mqtt-url", "not a url"]);
        assert!(SensorsBridgeConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_validate_no_sources() {
        let json = r#"{
            mqtt: { url: "mqtt://localhost" },
            sensors: {
                lm_sensors: { enabled: false },
                nvidia_smi: { enabled: false },
            },
        }"#;

        let config: SensorsBridgeConfig = parse_config(json).unwrap();
        assert!(config.validate_sensors().is_err());
    }

    #[test]
    fn test_interval_must_be_integer() {
        let result = SensorsArgs::try_parse_from(["sensors2mqtt", "--interval", "1.5"]);
        assert!(result.is_err());
    }
}
