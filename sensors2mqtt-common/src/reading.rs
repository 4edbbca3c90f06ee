use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Readings reported by one source during one poll cycle.
///
/// Devices keep the order in which the tool reported them.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingTree {
    source: Source,
    devices: Vec<DeviceReading>,
}

impl ReadingTree {
    /// Create an empty tree for a source.
    pub fn new(source: Source) -> Self {
        Self {
            source,
            devices: Vec::new(),
        }
    }

    /// The source that produced these readings.
    pub fn source(&self) -> Source {
        self.source
    }

    /// Insert a device reading.
    ///
    /// If a device with the same name is already present, it is replaced in place
    /// and the previous reading is returned.
    pub fn insert(&mut self, device: DeviceReading) -> Option<DeviceReading> {
        match self.devices.iter_mut().find(|d| d.name == device.name) {
            Some(existing) => Some(std::mem::replace(existing, device)),
            None => {
                self.devices.push(device);
                None
            }
        }
    }

    /// Look up a device by its reported name.
    pub fn get(&self, name: &str) -> Option<&DeviceReading> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Iterate over devices in report order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceReading> {
        self.devices.iter()
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the tree holds no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// All sensors of one device, as reported by the tool.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReading {
    /// Device name as reported (e.g. `coretemp-isa-0000`, `00000000:01:00.0`).
    pub name: String,
    /// Sensor name -> scalar value or group of sub-metrics.
    pub sensors: Map<String, Value>,
}

impl DeviceReading {
    /// Create a device reading.
    pub fn new(name: impl Into<String>, sensors: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            sensors,
        }
    }

    /// Iterate over sensors in report order.
    pub fn sensors(&self) -> impl Iterator<Item = (&str, SensorValue<'_>)> {
        self.sensors
            .iter()
            .map(|(name, value)| (name.as_str(), SensorValue::from_value(value)))
    }

    /// Look up a scalar sensor and render it as text.
    pub fn text(&self, sensor: &str) -> Option<String> {
        self.sensors
            .get(sensor)
            .and_then(|value| SensorValue::from_value(value).as_text())
    }

    /// The raw reading as the JSON object published on the state topic.
    pub fn to_json(&self) -> Value {
        Value::Object(self.sensors.clone())
    }
}

/// Shape of a single sensor entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue<'a> {
    /// A group of sub-metrics, e.g. `{"temp1_input": 45.0, "temp1_max": 80.0}`.
    Group(&'a Map<String, Value>),
    /// A single value, e.g. `"45"` or `"ISA adapter"`.
    Scalar(&'a Value),
}

impl<'a> SensorValue<'a> {
    /// Classify a JSON value by shape.
    pub fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => SensorValue::Group(map),
            other => SensorValue::Scalar(other),
        }
    }

    /// Render a scalar as text. Strings are returned without quotes.
    ///
    /// Returns `None` for groups and `null`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SensorValue::Scalar(Value::String(s)) => Some(s.clone()),
            SensorValue::Scalar(Value::Null) => None,
            SensorValue::Scalar(other) => Some(other.to_string()),
            SensorValue::Group(_) => None,
        }
    }
}

/// The built-in reading sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// `sensors -j` from lm-sensors.
    LmSensors,
    /// `nvidia-smi --query-gpu=... --format=csv`.
    NvidiaSmi,
}

impl Source {
    /// Get the string representation used in topics and object ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::LmSensors => "lm-sensors",
            Source::NvidiaSmi => "nvidia-smi",
        }
    }

    /// Origin name announced in discovery descriptors.
    pub fn origin_name(&self) -> &'static str {
        match self {
            Source::LmSensors => "lm-sensors2mqtt",
            Source::NvidiaSmi => "nvidia-smi2mqtt",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Get the current time in fractional seconds since Unix epoch.
pub fn current_timestamp_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensors(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_sensor_value_shapes() {
        let device = DeviceReading::new(
            "coretemp-isa-0000",
            sensors(json!({
                "Adapter": "ISA adapter",
                "Package id 0": { "temp1_input": 45.0, "temp1_max": 80.0 }
            })),
        );

        let shapes: Vec<_> = device.sensors().collect();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].0, "Adapter");
        assert!(matches!(shapes[0].1, SensorValue::Scalar(_)));
        assert_eq!(shapes[1].0, "Package id 0");
        assert!(matches!(shapes[1].1, SensorValue::Group(g) if g.len() == 2));
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(
            SensorValue::from_value(&json!("45")).as_text(),
            Some("45".to_string())
        );
        assert_eq!(
            SensorValue::from_value(&json!(1.5)).as_text(),
            Some("1.5".to_string())
        );
        assert_eq!(SensorValue::from_value(&Value::Null).as_text(), None);
        assert_eq!(SensorValue::from_value(&json!({"a": 1})).as_text(), None);
    }

    #[test]
    fn test_tree_insert_replaces_in_place() {
        let mut tree = ReadingTree::new(Source::NvidiaSmi);
        assert!(tree.is_empty());

        tree.insert(DeviceReading::new("a", sensors(json!({"x": "1"}))));
        tree.insert(DeviceReading::new("b", sensors(json!({"x": "2"}))));
        let previous = tree.insert(DeviceReading::new("a", sensors(json!({"x": "3"}))));

        assert_eq!(previous.and_then(|d| d.text("x")), Some("1".to_string()));
        assert_eq!(tree.len(), 2);
        let names: Vec<_> = tree.devices().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(tree.get("a").and_then(|d| d.text("x")), Some("3".to_string()));
    }

    #[test]
    fn test_source_names() {
        assert_eq!(Source::LmSensors.as_str(), "lm-sensors");
        assert_eq!(Source::NvidiaSmi.to_string(), "nvidia-smi");
        assert_eq!(Source::NvidiaSmi.origin_name(), "nvidia-smi2mqtt");
        assert_eq!(
            serde_json::to_string(&Source::LmSensors).unwrap(),
            "\"lm-sensors\""
        );
    }

    #[test]
    fn test_timestamp_is_seconds() {
        let now = current_timestamp_secs();
        // After 2020-01-01 and well below a millisecond timestamp
        assert!(now > 1_577_836_800.0);
        assert!(now < 100_000_000_000.0);
    }
}
