use thiserror::Error;

/// Common error type for sensors2mqtt components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("MQTT connection error: {0}")]
    Connection(String),

    #[error("Publish to '{topic}' was not acknowledged: {reason}")]
    NotAcknowledged { topic: String, reason: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid topic: {0}")]
    Topic(String),
}

/// Result type alias using sensors2mqtt's Error.
pub type Result<T> = std::result::Result<T, Error>;
