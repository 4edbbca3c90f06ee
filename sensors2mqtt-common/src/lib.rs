//! sensors2mqtt Common Library
//!
//! This crate provides shared types and utilities for sensors2mqtt bridges:
//!
//! - [`reading`] - Per-cycle reading model (`ReadingTree`, `DeviceReading`, `SensorValue`, `Source`)
//! - [`topic`] - Topic builders and the topic name sanitizer
//! - [`config`] - Configuration types (JSON5 format)
//! - [`bus`] - The `BusClient` abstraction consumed by publishers
//! - [`session`] - MQTT session management over `rumqttc`
//! - [`error`] - Error types

pub mod bus;
pub mod config;
pub mod error;
pub mod reading;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod topic;

// Re-export commonly used types at the crate root
pub use bus::{BusClient, PublishOptions, Qos};
pub use config::{BrokerEndpoint, LogFormat, LoggingConfig, MqttConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use reading::{DeviceReading, ReadingTree, SensorValue, Source, current_timestamp_secs};
pub use session::{LastWill, MqttSession, connect};
pub use topic::{DEFAULT_DISCOVERY_PREFIX, DEFAULT_ROOT_TOPIC, TopicBuilder, sanitize_topic_name};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Example
///
/// ```ignore
/// use sensors2mqtt_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
