//! Home Assistant MQTT discovery.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Home Assistant sensor device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Voltage,
}

/// The device an entity belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
}

/// The software that announced an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub name: String,
    pub sw: String,
}

impl Origin {
    /// Origin stamped with this crate's version.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sw: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Discovery descriptor for one sensor entity.
///
/// Published retained to `<discovery_prefix>/sensor/<object_id>/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub object_id: String,
    pub unique_id: String,
    pub name: String,
    /// Serialized as `null` when the sensor has no device class.
    pub device_class: Option<DeviceClass>,
    pub state_class: String,
    pub enabled_by_default: bool,
    pub unit_of_measurement: String,
    pub state_topic: String,
    pub value_template: String,
    pub availability_topic: String,
    pub availability_template: String,
    pub device: DeviceInfo,
    pub origin: Origin,
}

/// Object ids announced during this process lifetime.
///
/// Entries are added only after the broker acknowledged the descriptor and are
/// never removed.
#[derive(Debug, Default, Clone)]
pub struct DiscoveryRegistry {
    published: HashSet<String>,
}

impl DiscoveryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the descriptor for `object_id` still has to be published.
    pub fn should_publish(&self, object_id: &str) -> bool {
        !self.published.contains(object_id)
    }

    /// Record a successfully published descriptor.
    pub fn mark_published(&mut self, object_id: impl Into<String>) {
        self.published.insert(object_id.into());
    }

    /// Number of announced entities.
    pub fn len(&self) -> usize {
        self.published.len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::AVAILABILITY_TEMPLATE;

    fn descriptor(device_class: Option<DeviceClass>) -> EntityDescriptor {
        EntityDescriptor {
            object_id: "nvidia-smi_00000000_01_00_0/temperature_gpu".to_string(),
            unique_id: "nvidia-smi_00000000_01_00_0_temperature_gpu".to_string(),
            name: "temperature.gpu".to_string(),
            device_class,
            state_class: "measurement".to_string(),
            enabled_by_default: true,
            unit_of_measurement: "°C".to_string(),
            state_topic: "sensors2mqtt/nvidia-smi/00000000_01_00_0".to_string(),
            value_template: "{{ value_json[\"temperature.gpu\"] }}".to_string(),
            availability_topic: "sensors2mqtt/server".to_string(),
            availability_template: AVAILABILITY_TEMPLATE.to_string(),
            device: DeviceInfo {
                identifiers: vec!["sensors2mqtt/00000000_01_00_0".to_string()],
                manufacturer: "NVidia".to_string(),
                model: "NVIDIA GeForce RTX 3080".to_string(),
                name: "00000000_01_00_0".to_string(),
            },
            origin: Origin::new("nvidia-smi2mqtt"),
        }
    }

    #[test]
    fn test_descriptor_field_names() {
        let json = serde_json::to_value(descriptor(Some(DeviceClass::Temperature))).unwrap();

        assert_eq!(json["device_class"], "temperature");
        assert_eq!(json["state_class"], "measurement");
        assert_eq!(json["enabled_by_default"], true);
        assert_eq!(json["unit_of_measurement"], "°C");
        assert_eq!(json["device"]["identifiers"][0], "sensors2mqtt/00000000_01_00_0");
        assert_eq!(json["device"]["manufacturer"], "NVidia");
        assert_eq!(json["origin"]["name"], "nvidia-smi2mqtt");
        assert_eq!(json["origin"]["sw"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json.as_object().unwrap().len(), 13);
    }

    #[test]
    fn test_missing_device_class_is_null() {
        let json = serde_json::to_value(descriptor(None)).unwrap();
        assert!(json.as_object().unwrap().contains_key("device_class"));
        assert!(json["device_class"].is_null());
    }

    #[test]
    fn test_registry() {
        let mut registry = DiscoveryRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.should_publish("lm-sensors_coretemp-isa-0000/Core_0"));

        registry.mark_published("lm-sensors_coretemp-isa-0000/Core_0");
        registry.mark_published("lm-sensors_coretemp-isa-0000/Core_0");

        assert!(!registry.should_publish("lm-sensors_coretemp-isa-0000/Core_0"));
        assert!(registry.should_publish("lm-sensors_coretemp-isa-0000/Core_1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_should_publish_does_not_record() {
        let registry = DiscoveryRegistry::new();
        let id = "nvidia-smi_00000000_01_00_0/temperature_gpu";

        assert!(registry.should_publish(id));
        assert!(registry.should_publish(id));
        assert!(registry.is_empty());
    }
}
