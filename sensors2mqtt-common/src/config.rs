use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// MQTT broker connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker URL, e.g. `mqtt://broker.lan:1883` or `mqtts://broker.lan`.
    #[serde(default)]
    pub url: Option<String>,

    /// Username for broker authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for broker authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Client identifier. Generated from the process id when unset.
    #[serde(default)]
    pub client_id: Option<String>,

    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// How long to wait for the first CONNACK.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// How long to wait for a publish acknowledgment.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_ack_timeout_secs() -> u64 {
    10
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

/// Broker address resolved from [`MqttConfig::url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl MqttConfig {
    /// Parse and validate the broker URL.
    ///
    /// Accepted schemes are `mqtt`/`tcp` (default port 1883) and
    /// `mqtts`/`ssl` (TLS, default port 8883).
    pub fn endpoint(&self) -> Result<BrokerEndpoint> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| Error::Config("MQTT broker URL is required (MQTT_URL)".to_string()))?;

        let url = url::Url::parse(raw)
            .map_err(|e| Error::Config(format!("Invalid MQTT URL '{}': {}", raw, e)))?;

        let (tls, default_port) = match url.scheme() {
            "mqtt" | "tcp" => (false, 1883),
            "mqtts" | "ssl" => (true, 8883),
            other => {
                return Err(Error::Config(format!(
                    "Unsupported MQTT URL scheme '{}'. Expected mqtt, tcp, mqtts or ssl",
                    other
                )));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Config(format!("MQTT URL '{}' has no host", raw)))?;

        Ok(BrokerEndpoint {
            host: host.to_string(),
            port: url.port().unwrap_or(default_port),
            tls,
        })
    }

    /// Validate the connection settings.
    pub fn validate(&self) -> Result<()> {
        self.endpoint()?;

        if self.keep_alive_secs < 5 {
            return Err(Error::Config("keep_alive_secs must be >= 5".to_string()));
        }
        if self.connect_timeout_secs == 0 || self.ack_timeout_secs == 0 {
            return Err(Error::Config("MQTT timeouts must be > 0".to_string()));
        }

        Ok(())
    }

    /// Username and password sent on connect, if either is set.
    ///
    /// A missing half is sent as an empty string.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_none() && self.password.is_none() {
            return None;
        }
        Some((
            self.username.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
        ))
    }

    /// Keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Timeout for the initial connection.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Timeout for a single publish acknowledgment.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_url(url: &str) -> MqttConfig {
        MqttConfig {
            url: Some(url.to_string()),
            ..MqttConfig::default()
        }
    }

    #[test]
    fn test_parse_mqtt_config() {
        let json5 = r#"
        {
            url: "mqtt://broker.lan:1884",
            username: "sensors",
            password: "secret",
            keep_alive_secs: 60,
        }
        "#;

        let config: MqttConfig = parse_config(json5).unwrap();

        assert_eq!(config.url.as_deref(), Some("mqtt://broker.lan:1884"));
        assert_eq!(config.username.as_deref(), Some("sensors"));
        assert_eq!(config.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.ack_timeout_secs, 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_default_config() {
        let config: MqttConfig = parse_config("{}").unwrap();

        assert!(config.url.is_none());
        assert_eq!(config.keep_alive_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_default_ports() {
        let plain = with_url("mqtt://localhost").endpoint().unwrap();
        assert_eq!(plain.host, "localhost");
        assert_eq!(plain.port, 1883);
        assert!(!plain.tls);

        let tls = with_url("mqtts://broker.example.com").endpoint().unwrap();
        assert_eq!(tls.port, 8883);
        assert!(tls.tls);

        let explicit = with_url("tcp://10.0.0.2:2883").endpoint().unwrap();
        assert_eq!(explicit.host, "10.0.0.2");
        assert_eq!(explicit.port, 2883);
    }

    #[test]
    fn test_endpoint_rejects_invalid_urls() {
        assert!(with_url("not a url").endpoint().is_err());
        assert!(with_url("ws://broker:9001").endpoint().is_err());
        assert!(with_url("mqtt://").endpoint().is_err());
        assert!(MqttConfig::default().endpoint().is_err());
    }

    #[test]
    fn test_password_without_username() {
        let config = MqttConfig {
            password: Some("secret".to_string()),
            ..with_url("mqtt://localhost")
        };
        config.validate().unwrap();
        assert_eq!(config.credentials(), Some(("", "secret")));

        assert_eq!(with_url("mqtt://localhost").credentials(), None);

        let config = MqttConfig {
            username: Some("ha".to_string()),
            ..with_url("mqtt://localhost")
        };
        assert_eq!(config.credentials(), Some(("ha", "")));
    }

    #[test]
    fn test_json_logging_format() {
        let json5 = r#"
        {
            level: "debug",
            format: "json",
        }
        "#;

        let config: LoggingConfig = parse_config(json5).unwrap();

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
    }
}
