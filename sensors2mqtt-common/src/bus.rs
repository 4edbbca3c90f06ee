//! Message bus abstraction.
//!
//! Bridges publish through [`BusClient`] so the polling and discovery logic can run
//! against the real MQTT session or an in-memory bus in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Per-message publish options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub qos: Qos,
    pub retain: bool,
}

impl PublishOptions {
    /// At-least-once, not retained. Used for readings and online availability.
    pub const fn transient() -> Self {
        Self {
            qos: Qos::AtLeastOnce,
            retain: false,
        }
    }

    /// At-least-once, retained. Used for discovery and offline availability.
    pub const fn retained() -> Self {
        Self {
            qos: Qos::AtLeastOnce,
            retain: true,
        }
    }
}

/// A publish/subscribe client.
#[async_trait]
pub trait BusClient: Send + Sync + std::fmt::Debug {
    /// Publish a payload and wait until the broker acknowledged it
    /// (for `AtMostOnce`, until it was written to the connection).
    async fn publish(&self, topic: &str, payload: Vec<u8>, options: PublishOptions) -> Result<()>;

    /// Whether the connection to the broker is currently up.
    fn is_connected(&self) -> bool;

    /// Close the connection to the broker.
    async fn disconnect(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_options() {
        assert!(!PublishOptions::transient().retain);
        assert!(PublishOptions::retained().retain);
        assert_eq!(PublishOptions::retained().qos, Qos::AtLeastOnce);
        assert_eq!(PublishOptions::default(), PublishOptions::transient());
    }

    #[test]
    fn test_qos_conversion() {
        assert_eq!(rumqttc::QoS::from(Qos::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(rumqttc::QoS::from(Qos::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(rumqttc::QoS::from(Qos::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }
}
