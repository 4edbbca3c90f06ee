//! Bridge availability reporting.
//!
//! The bridge reports its liveness on `<root>/server`. Every discovery
//! descriptor carries [`AVAILABILITY_TEMPLATE`], so Home Assistant treats the
//! entities as unavailable once the last `online` report is older than a minute.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sensors2mqtt_common::{LastWill, PublishOptions, current_timestamp_secs};

use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;

/// Home Assistant template deciding entity availability from the payload.
pub const AVAILABILITY_TEMPLATE: &str = "{% if value_json.state == \"online\" and \
     as_datetime(value_json.last_update) > now() - timedelta(minutes = 1) %} online \
     {% else %} offline {% endif %}";

/// Bridge availability state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityState {
    Online,
    Offline,
}

/// Payload published on the availability topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityPayload {
    pub state: AvailabilityState,
    /// Unix time in seconds.
    pub last_update: f64,
}

impl AvailabilityPayload {
    /// An `online` payload stamped with the current time.
    pub fn online() -> Self {
        Self {
            state: AvailabilityState::Online,
            last_update: current_timestamp_secs(),
        }
    }

    /// An `offline` payload stamped with the current time.
    pub fn offline() -> Self {
        Self {
            state: AvailabilityState::Offline,
            last_update: current_timestamp_secs(),
        }
    }
}

/// Helper to publish bridge availability.
#[derive(Debug, Clone)]
pub struct AvailabilityPublisher {
    publisher: Publisher,
}

impl AvailabilityPublisher {
    /// Create a new availability publisher.
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }

    /// The last will to register at connect time.
    ///
    /// Announces the bridge as offline (retained) if the connection drops
    /// without a clean disconnect.
    pub fn last_will(topic: impl Into<String>) -> Result<LastWill> {
        Ok(LastWill {
            topic: topic.into(),
            payload: serde_json::to_vec(&AvailabilityPayload::offline())?,
            options: PublishOptions::retained(),
        })
    }

    /// Publish `online`, not retained.
    pub async fn publish_online(&self) -> Result<()> {
        let topic = self.publisher.topics().availability();
        self.publisher
            .publish_json(&topic, &AvailabilityPayload::online(), PublishOptions::transient())
            .await
    }

    /// Publish `offline`, retained, waiting at most `timeout` for the acknowledgment.
    pub async fn publish_offline(&self, timeout: Duration) -> Result<()> {
        let topic = self.publisher.topics().availability();
        let payload = AvailabilityPayload::offline();
        let publish = self
            .publisher
            .publish_json(&topic, &payload, PublishOptions::retained());

        match tokio::time::timeout(timeout, publish).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Publish {
                topic,
                message: format!("no acknowledgment within {}ms", timeout.as_millis()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sensors2mqtt_common::TopicBuilder;
    use sensors2mqtt_common::testing::MemoryBus;

    fn availability(bus: &Arc<MemoryBus>) -> AvailabilityPublisher {
        AvailabilityPublisher::new(Publisher::new(bus.clone(), TopicBuilder::new("sensors2mqtt")))
    }

    #[test]
    fn test_payload_serialization() {
        let payload = AvailabilityPayload {
            state: AvailabilityState::Online,
            last_update: 1_700_000_000.5,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"state":"online","last_update":1700000000.5}"#);
    }

    #[test]
    fn test_template_text() {
        assert_eq!(
            AVAILABILITY_TEMPLATE,
            "{% if value_json.state == \"online\" and as_datetime(value_json.last_update) \
             > now() - timedelta(minutes = 1) %} online {% else %} offline {% endif %}"
        );
    }

    #[tokio::test]
    async fn test_online_is_transient() {
        let bus = Arc::new(MemoryBus::new());
        availability(&bus).publish_online().await.unwrap();

        let messages = bus.messages();
        assert_eq!(messages[0].topic, "sensors2mqtt/server");
        assert!(!messages[0].options.retain);
        assert_eq!(messages[0].json()["state"], "online");
        assert!(messages[0].json()["last_update"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_offline_is_retained() {
        let bus = Arc::new(MemoryBus::new());
        availability(&bus)
            .publish_offline(Duration::from_secs(5))
            .await
            .unwrap();

        let messages = bus.messages();
        assert_eq!(messages[0].topic, "sensors2mqtt/server");
        assert!(messages[0].options.retain);
        assert_eq!(messages[0].json()["state"], "offline");
    }

    #[test]
    fn test_last_will() {
        let will = AvailabilityPublisher::last_will("sensors2mqtt/server").unwrap();
        assert_eq!(will.topic, "sensors2mqtt/server");
        assert!(will.options.retain);

        let payload: AvailabilityPayload = serde_json::from_slice(&will.payload).unwrap();
        assert_eq!(payload.state, AvailabilityState::Offline);
    }
}
