//! The polling loop.

use std::time::Duration;

use sensors2mqtt_bridge_framework::{
    AvailabilityPublisher, BridgeError, DeviceReading, DiscoveryRegistry, PublishOptions,
    PublishStats, Publisher, ReadingTree, Result, Source,
};
use sensors2mqtt_common::sanitize_topic_name;

use crate::config::SensorsConfig;
use crate::entity::{self, Classification, ClassifyContext};
use crate::nvidia_smi::MODEL_COLUMN;
use crate::source::{CommandSource, ReadingSource};

/// What one cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Sources that produced a reading tree.
    pub sources: usize,
    /// Devices across all sources.
    pub devices: usize,
    /// Raw reading publishes.
    pub readings: PublishStats,
    /// Discovery descriptor publishes.
    pub discoveries: PublishStats,
    /// Sensors no rule matched.
    pub unclassifiable: usize,
}

/// Polls the sources and publishes readings, discovery and availability.
pub struct SensorPoller {
    sources: Vec<Box<dyn ReadingSource>>,
    registry: DiscoveryRegistry,
    interval: Duration,
    hostname: String,
}

impl SensorPoller {
    /// Create a poller over the given sources.
    pub fn new(sources: Vec<Box<dyn ReadingSource>>, interval: Duration, hostname: String) -> Self {
        Self {
            sources,
            registry: DiscoveryRegistry::new(),
            interval,
            hostname,
        }
    }

    /// Create a poller running the enabled tools.
    pub fn from_config(config: &SensorsConfig, hostname: String) -> Self {
        let sources = [Source::LmSensors, Source::NvidiaSmi]
            .into_iter()
            .filter(|source| config.source(*source).enabled)
            .map(|source| {
                Box::new(CommandSource::from_config(source, config.source(source)))
                    as Box<dyn ReadingSource>
            })
            .collect();

        Self::new(sources, config.interval(), hostname)
    }

    /// Entities announced so far.
    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    /// Poll forever.
    ///
    /// Returns [`BridgeError::TransportDown`] once the broker connection is
    /// found closed at the start of a cycle.
    pub async fn run(mut self, publisher: Publisher) -> Result<()> {
        tracing::info!(
            sources = self.sources.len(),
            interval_ms = self.interval.as_millis() as u64,
            hostname = %self.hostname,
            "Starting sensor poller"
        );

        loop {
            self.poll_once(&publisher).await?;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Run one cycle.
    pub async fn poll_once(&mut self, publisher: &Publisher) -> Result<CycleStats> {
        if !publisher.is_connected() {
            tracing::error!("MQTT connection lost");
            return Err(BridgeError::TransportDown);
        }

        let mut stats = CycleStats::default();

        for tree in self.read_sources().await {
            stats.sources += 1;
            for device in tree.devices() {
                stats.devices += 1;
                self.publish_device(publisher, tree.source(), device, &mut stats)
                    .await;
            }
        }

        if let Err(e) = AvailabilityPublisher::new(publisher.clone())
            .publish_online()
            .await
        {
            tracing::warn!(error = %e, "Failed to publish online availability");
        }

        tracing::debug!(
            sources = stats.sources,
            devices = stats.devices,
            readings = stats.readings.success,
            discoveries = stats.discoveries.success,
            failed = stats.readings.failed + stats.discoveries.failed,
            unclassifiable = stats.unclassifiable,
            "Cycle complete"
        );

        if stats.discoveries.success > 0 {
            tracing::info!(
                new = stats.discoveries.success,
                total = self.registry.len(),
                "Announced entities"
            );
        }

        Ok(stats)
    }

    /// Read and parse every source, skipping the ones that fail.
    async fn read_sources(&self) -> Vec<ReadingTree> {
        let mut trees = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let kind = source.source();
            let output = match source.read().await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(source = %kind, error = %e, "Source unavailable");
                    continue;
                }
            };

            match entity::parse(kind, &output) {
                Ok(tree) => trees.push(tree),
                Err(e) => tracing::warn!(source = %kind, error = %e, "Failed to parse output"),
            }
        }

        trees
    }

    async fn publish_device(
        &mut self,
        publisher: &Publisher,
        source: Source,
        device: &DeviceReading,
        stats: &mut CycleStats,
    ) {
        let device_id = sanitize_topic_name(&device.name);
        let topics = publisher.topics();

        let state_topic = topics.state(source, &device_id);
        let result = publisher
            .publish_json(&state_topic, &device.to_json(), PublishOptions::transient())
            .await;
        if let Err(e) = &result {
            tracing::warn!(device = %device_id, error = %e, "Failed to publish reading");
        }
        stats.readings.record(&result);

        let model = match source {
            Source::LmSensors => self.hostname.clone(),
            Source::NvidiaSmi => device.text(MODEL_COLUMN).unwrap_or_default(),
        };
        let ctx = ClassifyContext {
            topics,
            source,
            device: &device_id,
            model: &model,
        };

        for (sensor, value) in device.sensors() {
            let classified = match entity::classify(&ctx, sensor, value) {
                Classification::Entity(classified) => classified,
                Classification::Excluded => continue,
                Classification::Unclassifiable { reason } => {
                    tracing::debug!(
                        source = %source,
                        device = %device_id,
                        sensor,
                        value = ?value,
                        reason,
                        "Unclassifiable sensor"
                    );
                    stats.unclassifiable += 1;
                    continue;
                }
            };

            let object_id = &classified.descriptor.object_id;
            if !self.registry.should_publish(object_id) {
                continue;
            }

            let topic = topics.discovery(object_id);
            let result = publisher
                .publish_json(&topic, &classified.descriptor, PublishOptions::retained())
                .await;

            match &result {
                Ok(()) => {
                    tracing::debug!(
                        object_id = %object_id,
                        value = classified.value.as_deref().unwrap_or_default(),
                        "Published discovery"
                    );
                    self.registry.mark_published(object_id.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        object_id = %object_id,
                        error = %e,
                        "Failed to publish discovery"
                    );
                }
            }
            stats.discoveries.record(&result);
        }
    }
}
