//! Classification of readings into Home Assistant entities.

use thiserror::Error;

use sensors2mqtt_bridge_framework::{
    AVAILABILITY_TEMPLATE, DeviceClass, DeviceInfo, EntityDescriptor, Origin, ReadingTree,
    SensorValue, Source, TopicBuilder,
};
use sensors2mqtt_common::sanitize_topic_name;

use crate::{lm_sensors, nvidia_smi};

/// Tool output that could not be turned into a reading tree.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("malformed output: {0}")]
    Malformed(String),

    #[error("header has no {column} column")]
    MissingKeyColumn { column: &'static str },
}

/// Outcome of classifying one sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The sensor maps to a Home Assistant entity.
    Entity(ClassifiedEntity),
    /// The sensor is metadata and never becomes an entity.
    Excluded,
    /// No rule matched.
    Unclassifiable { reason: &'static str },
}

/// A sensor together with its discovery descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEntity {
    pub descriptor: EntityDescriptor,
    /// Current value with the unit removed, if the reading has one.
    pub value: Option<String>,
}

/// Everything a classifier needs to know about the device being classified.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub topics: &'a TopicBuilder,
    pub source: Source,
    /// Sanitized device name.
    pub device: &'a str,
    /// Device model shown in Home Assistant.
    pub model: &'a str,
}

impl ClassifyContext<'_> {
    /// Build the descriptor of a sensor of this device.
    pub fn descriptor(
        &self,
        sensor: &str,
        device_class: Option<DeviceClass>,
        unit: &str,
        value_template: String,
    ) -> EntityDescriptor {
        let sensor_id = sanitize_topic_name(sensor);
        let entity_prefix = format!("{}_{}", self.source.as_str(), self.device);

        EntityDescriptor {
            object_id: format!("{entity_prefix}/{sensor_id}"),
            unique_id: format!("{entity_prefix}_{sensor_id}"),
            name: sensor.to_string(),
            device_class,
            state_class: "measurement".to_string(),
            enabled_by_default: true,
            unit_of_measurement: unit.to_string(),
            state_topic: self.topics.state(self.source, self.device),
            value_template,
            availability_topic: self.topics.availability(),
            availability_template: AVAILABILITY_TEMPLATE.to_string(),
            device: DeviceInfo {
                identifiers: vec![self.topics.device_identifier(self.device)],
                manufacturer: manufacturer(self.source).to_string(),
                model: self.model.to_string(),
                name: self.device.to_string(),
            },
            origin: Origin::new(self.source.origin_name()),
        }
    }
}

/// Manufacturer reported for the devices of a source.
pub fn manufacturer(source: Source) -> &'static str {
    match source {
        Source::LmSensors => "sensors2mqtt",
        Source::NvidiaSmi => "NVidia",
    }
}

/// Parse the raw output of a source.
pub fn parse(source: Source, output: &str) -> Result<ReadingTree, ParseError> {
    match source {
        Source::LmSensors => lm_sensors::parse(output),
        Source::NvidiaSmi => nvidia_smi::parse(output),
    }
}

/// Classify one sensor of the device described by `ctx`.
pub fn classify(ctx: &ClassifyContext<'_>, sensor: &str, value: SensorValue<'_>) -> Classification {
    match ctx.source {
        Source::LmSensors => lm_sensors::classify(ctx, sensor, value),
        Source::NvidiaSmi => nvidia_smi::classify(ctx, sensor, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifiers_are_sanitized() {
        let topics = TopicBuilder::new("sensors2mqtt");
        let ctx = ClassifyContext {
            topics: &topics,
            source: Source::LmSensors,
            device: "nct6798-isa-0290",
            model: "desk",
        };

        let descriptor = ctx.descriptor(
            "CPU Fan: 1.0",
            None,
            "RPM",
            "{{ value_json[\"CPU Fan: 1.0\"][\"fan1_input\"] }}".to_string(),
        );

        assert_eq!(descriptor.object_id, "lm-sensors_nct6798-isa-0290/CPU_Fan__1_0");
        assert_eq!(descriptor.unique_id, "lm-sensors_nct6798-isa-0290_CPU_Fan__1_0");
        assert_eq!(descriptor.name, "CPU Fan: 1.0");
        assert_eq!(descriptor.state_topic, "sensors2mqtt/lm-sensors/nct6798-isa-0290");
        assert_eq!(descriptor.availability_topic, "sensors2mqtt/server");
        assert_eq!(descriptor.device.identifiers, ["sensors2mqtt/nct6798-isa-0290"]);
        assert_eq!(descriptor.device.manufacturer, "sensors2mqtt");
        assert_eq!(descriptor.origin.name, "lm-sensors2mqtt");
    }

    #[test]
    fn test_dispatch_by_source() {
        let topics = TopicBuilder::new("sensors2mqtt");
        let ctx = ClassifyContext {
            topics: &topics,
            source: Source::NvidiaSmi,
            device: "00000000_01_00_0",
            model: "NVIDIA GeForce RTX 3080",
        };

        let value = json!("45");
        let classification = classify(&ctx, "temperature.gpu", SensorValue::from_value(&value));
        let Classification::Entity(entity) = classification else {
            panic!("expected an entity");
        };
        assert_eq!(entity.descriptor.device.manufacturer, "NVidia");
        assert_eq!(entity.descriptor.device.model, "NVIDIA GeForce RTX 3080");

        assert!(matches!(
            parse(Source::LmSensors, "not json"),
            Err(ParseError::InvalidJson(_))
        ));
    }
}
