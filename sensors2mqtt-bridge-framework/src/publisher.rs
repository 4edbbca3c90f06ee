//! Message publisher for the MQTT bus.

use std::sync::Arc;

use sensors2mqtt_common::{BusClient, PublishOptions, TopicBuilder};

use crate::error::{BridgeError, Result};

/// Publisher for sending bridge messages to the bus.
///
/// Wraps a [`BusClient`] and the bridge's [`TopicBuilder`] and provides
/// convenient methods for publishing JSON values.
#[derive(Clone, Debug)]
pub struct Publisher {
    client: Arc<dyn BusClient>,
    topics: TopicBuilder,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(client: Arc<dyn BusClient>, topics: TopicBuilder) -> Self {
        Self { client, topics }
    }

    /// Get the topic builder.
    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Whether the bus connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Publish raw bytes to a topic and wait for the acknowledgment.
    pub async fn publish_raw(
        &self,
        topic: &str,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<()> {
        self.client
            .publish(topic, payload, options)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    /// Publish a JSON value to a topic.
    pub async fn publish_json<T: serde::Serialize + ?Sized>(
        &self,
        topic: &str,
        value: &T,
        options: PublishOptions,
    ) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(topic, payload, options).await
    }
}

/// Statistics from a series of publishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successfully published messages.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    /// Count the outcome of one publish.
    pub fn record<T, E>(&mut self, outcome: &std::result::Result<T, E>) {
        match outcome {
            Ok(_) => self.success += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}
