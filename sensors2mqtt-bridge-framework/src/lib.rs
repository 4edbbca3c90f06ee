//! sensors2mqtt Bridge Framework
//!
//! Common abstractions for bridges that publish readings and Home Assistant
//! discovery to an MQTT broker.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading, overrides and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] for publishing JSON payloads and waiting for acknowledgments
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`AvailabilityPublisher`] for the online/offline contract
//! - [`EntityDescriptor`] and [`DiscoveryRegistry`] for discovery announcements
//!
//! # Example
//!
//! ```ignore
//! use sensors2mqtt_bridge_framework::{BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MyBridgeConfig::resolve(&args, |_| {})?;
//!     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!
//!     // Run until a shutdown signal
//!     runner.run(|publisher| my_worker(publisher)).await?;
//!     Ok(())
//! }
//! ```

mod args;
mod availability;
mod config;
mod discovery;
mod error;
mod publisher;
mod runner;

pub use args::BridgeArgs;
pub use availability::{
    AVAILABILITY_TEMPLATE, AvailabilityPayload, AvailabilityPublisher, AvailabilityState,
};
pub use config::BridgeConfig;
pub use discovery::{DeviceClass, DeviceInfo, DiscoveryRegistry, EntityDescriptor, Origin};
pub use error::{BridgeError, Result};
pub use publisher::{PublishStats, Publisher};
pub use runner::{BridgeRunner, shutdown_signal};

// Re-export commonly used types from sensors2mqtt-common
pub use sensors2mqtt_common::{
    BusClient, DeviceReading, LoggingConfig, MqttConfig, PublishOptions, ReadingTree,
    SensorValue, Source, TopicBuilder,
};
