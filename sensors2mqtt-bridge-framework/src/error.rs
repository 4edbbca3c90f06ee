//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// MQTT connection could not be established.
    #[error("MQTT connection error: {0}")]
    MqttConnection(String),

    /// The broker connection was observed closed.
    #[error("MQTT connection lost")]
    TransportDown,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error means the bridge cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportDown | Self::MqttConnection(_))
    }
}

impl From<sensors2mqtt_common::Error> for BridgeError {
    fn from(err: sensors2mqtt_common::Error) -> Self {
        use sensors2mqtt_common::Error as CommonError;

        match err {
            CommonError::Config(msg) | CommonError::Topic(msg) => Self::ConfigValidation(msg),
            CommonError::Connection(msg) => Self::MqttConnection(msg),
            CommonError::Json(e) => Self::Serialization(e.to_string()),
            CommonError::Io(e) => Self::Io(e),
            CommonError::NotAcknowledged { topic, reason } => Self::Publish {
                topic,
                message: reason,
            },
            CommonError::Mqtt(e) => Self::MqttConnection(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_error_conversion() {
        let err: BridgeError = sensors2mqtt_common::Error::NotAcknowledged {
            topic: "sensors2mqtt/server".to_string(),
            reason: "timed out after 10s".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Failed to publish to sensors2mqtt/server: timed out after 10s"
        );

        let err: BridgeError = sensors2mqtt_common::Error::Config("bad url".to_string()).into();
        assert!(matches!(err, BridgeError::ConfigValidation(_)));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(BridgeError::TransportDown.is_fatal());
        assert!(!BridgeError::config("x").is_fatal());
    }
}
