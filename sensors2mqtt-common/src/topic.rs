use crate::error::{Error, Result};
use crate::reading::Source;

/// Default root topic for all sensors2mqtt traffic.
pub const DEFAULT_ROOT_TOPIC: &str = "sensors2mqtt";

/// Default Home Assistant discovery prefix.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Make a device or sensor name safe for MQTT topics and discovery object ids.
///
/// Home Assistant only accepts `[a-zA-Z0-9_-]` in discovery node and object ids;
/// the names reported by lm-sensors and nvidia-smi commonly contain spaces,
/// dots and colons, which are replaced with `_`.
///
/// # Example
/// ```
/// use sensors2mqtt_common::topic::sanitize_topic_name;
///
/// assert_eq!(sanitize_topic_name("Package id 0"), "Package_id_0");
/// assert_eq!(sanitize_topic_name("00000000:01:00.0"), "00000000_01_00_0");
/// ```
pub fn sanitize_topic_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '.' | ':' => '_',
            other => other,
        })
        .collect()
}

/// Builder for the topics a bridge publishes to.
///
/// Topics follow the layout:
/// - `<root>/server` for availability
/// - `<root>/<source>/<device>` for raw readings
/// - `<discovery_prefix>/sensor/<object_id>/config` for discovery descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    root: String,
    discovery_prefix: String,
}

impl TopicBuilder {
    /// Create a builder for a root topic with the default discovery prefix.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
        }
    }

    /// Create a builder with a custom discovery prefix.
    pub fn with_discovery_prefix(
        root: impl Into<String>,
        discovery_prefix: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            discovery_prefix: discovery_prefix.into(),
        }
    }

    /// The root topic.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The discovery prefix.
    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    /// Topic carrying the bridge availability payload.
    ///
    /// # Example
    /// ```
    /// use sensors2mqtt_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("sensors2mqtt");
    /// assert_eq!(topics.availability(), "sensors2mqtt/server");
    /// ```
    pub fn availability(&self) -> String {
        format!("{}/server", self.root)
    }

    /// Topic carrying the raw reading of one device of a source.
    ///
    /// `device` must already be sanitized.
    ///
    /// # Example
    /// ```
    /// use sensors2mqtt_common::reading::Source;
    /// use sensors2mqtt_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("sensors2mqtt");
    /// assert_eq!(
    ///     topics.state(Source::LmSensors, "coretemp-isa-0000"),
    ///     "sensors2mqtt/lm-sensors/coretemp-isa-0000"
    /// );
    /// ```
    pub fn state(&self, source: Source, device: &str) -> String {
        format!("{}/{}/{}", self.root, source.as_str(), device)
    }

    /// Identifier grouping all entities of one physical device.
    pub fn device_identifier(&self, device: &str) -> String {
        format!("{}/{}", self.root, device)
    }

    /// Discovery config topic for an entity.
    ///
    /// # Example
    /// ```
    /// use sensors2mqtt_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("sensors2mqtt");
    /// assert_eq!(
    ///     topics.discovery("nvidia-smi_00000000_01_00_0/temperature_gpu"),
    ///     "homeassistant/sensor/nvidia-smi_00000000_01_00_0/temperature_gpu/config"
    /// );
    /// ```
    pub fn discovery(&self, object_id: &str) -> String {
        format!("{}/sensor/{}/config", self.discovery_prefix, object_id)
    }
}

/// Check that a topic is usable as a publish prefix.
///
/// Publish topics must be non-empty and must not contain the MQTT wildcards
/// `+` and `#`.
pub fn validate_topic_prefix(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(Error::Topic("topic must not be empty".to_string()));
    }
    if topic.contains(['+', '#']) {
        return Err(Error::Topic(format!(
            "'{}' must not contain MQTT wildcards",
            topic
        )));
    }
    if topic.starts_with('/') || topic.ends_with('/') {
        return Err(Error::Topic(format!(
            "'{}' must not start or end with '/'",
            topic
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_separators() {
        let inputs = [
            "Package id 0",
            "00000000:01:00.0",
            "temperature.gpu",
            "a b.c:d  e..f::g",
        ];

        for input in inputs {
            let sanitized = sanitize_topic_name(input);
            assert!(!sanitized.contains([' ', '.', ':']), "{input} -> {sanitized}");
            assert_eq!(sanitized.len(), input.len());
            // Pure: the same input always maps to the same output
            assert_eq!(sanitized, sanitize_topic_name(input));
        }
    }

    #[test]
    fn test_sanitize_keeps_other_characters() {
        assert_eq!(sanitize_topic_name("coretemp-isa-0000"), "coretemp-isa-0000");
        assert_eq!(sanitize_topic_name("fan1"), "fan1");
        assert_eq!(sanitize_topic_name(""), "");
    }

    #[test]
    fn test_topic_builder() {
        let topics = TopicBuilder::new("sensors2mqtt");

        assert_eq!(topics.availability(), "sensors2mqtt/server");
        assert_eq!(
            topics.state(Source::NvidiaSmi, "00000000_01_00_0"),
            "sensors2mqtt/nvidia-smi/00000000_01_00_0"
        );
        assert_eq!(
            topics.device_identifier("nct6798-isa-0290"),
            "sensors2mqtt/nct6798-isa-0290"
        );
        assert_eq!(
            topics.discovery("lm-sensors_nct6798-isa-0290/fan1"),
            "homeassistant/sensor/lm-sensors_nct6798-isa-0290/fan1/config"
        );
    }

    #[test]
    fn test_custom_discovery_prefix() {
        let topics = TopicBuilder::with_discovery_prefix("hosts/nas", "ha");
        assert_eq!(topics.root(), "hosts/nas");
        assert_eq!(topics.discovery("x/y"), "ha/sensor/x/y/config");
    }

    #[test]
    fn test_validate_topic_prefix() {
        assert!(validate_topic_prefix("sensors2mqtt").is_ok());
        assert!(validate_topic_prefix("hosts/nas").is_ok());
        assert!(validate_topic_prefix("").is_err());
        assert!(validate_topic_prefix("sensors/#").is_err());
        assert!(validate_topic_prefix("sensors/+/x").is_err());
        assert!(validate_topic_prefix("/sensors").is_err());
    }
}
