//! lm-sensors (`sensors -j`) output.
//!
//! The output maps each chip to its features, and each feature to its
//! sub-features:
//!
//! ```text
//! {
//!   "coretemp-isa-0000": {
//!     "Adapter": "ISA adapter",
//!     "Package id 0": { "temp1_input": 45.0, "temp1_max": 80.0, "temp1_crit": 100.0 }
//!   }
//! }
//! ```
//!
//! Every feature with an `_input` sub-feature of a known kind becomes one entity.

use serde_json::Value;

use sensors2mqtt_bridge_framework::{DeviceClass, DeviceReading, ReadingTree, SensorValue, Source};

use crate::entity::{Classification, ClassifiedEntity, ClassifyContext, ParseError};

/// Program run by default.
pub const DEFAULT_COMMAND: &str = "sensors";

/// Arguments passed by default.
pub const DEFAULT_ARGS: &[&str] = &["-j"];

/// Scalar feature naming the bus a chip sits on.
const ADAPTER: &str = "Adapter";

/// Sub-feature prefixes in match priority order.
const RULES: &[(&str, Option<DeviceClass>, &str)] = &[
    ("fan", None, "RPM"),
    ("temp", Some(DeviceClass::Temperature), "°C"),
    ("in", Some(DeviceClass::Voltage), "V"),
];

/// Parse `sensors -j` output.
///
/// Chips keep the order of the output. A chip whose entry is not an object is
/// skipped.
pub fn parse(output: &str) -> Result<ReadingTree, ParseError> {
    let document: Value = serde_json::from_str(output)?;
    let Value::Object(chips) = document else {
        return Err(ParseError::Malformed("top level is not an object".to_string()));
    };

    let mut tree = ReadingTree::new(Source::LmSensors);
    for (chip, features) in chips {
        match features {
            Value::Object(features) => {
                tree.insert(DeviceReading::new(chip, features));
            }
            other => {
                tracing::warn!(
                    device = %chip,
                    value = %other,
                    "Skipping malformed lm-sensors chip"
                );
            }
        }
    }

    Ok(tree)
}

/// Classify one feature of a chip.
pub fn classify(ctx: &ClassifyContext<'_>, sensor: &str, value: SensorValue<'_>) -> Classification {
    let sub_features = match value {
        SensorValue::Scalar(_) if sensor == ADAPTER => return Classification::Excluded,
        SensorValue::Scalar(_) => {
            return Classification::Unclassifiable {
                reason: "feature has no sub-features",
            };
        }
        SensorValue::Group(sub_features) => sub_features,
    };

    let rule = RULES
        .iter()
        .find(|(prefix, _, _)| sub_features.keys().any(|key| key.starts_with(prefix)));
    let Some(&(_, device_class, unit)) = rule else {
        return Classification::Unclassifiable {
            reason: "no known sub-feature prefix",
        };
    };

    let Some(input) = sub_features.keys().find(|key| key.ends_with("_input")) else {
        return Classification::Unclassifiable {
            reason: "no _input sub-feature",
        };
    };

    let template = format!("{{{{ value_json[\"{sensor}\"][\"{input}\"] }}}}");
    let current = sub_features
        .get(input)
        .and_then(|v| SensorValue::from_value(v).as_text());

    Classification::Entity(ClassifiedEntity {
        descriptor: ctx.descriptor(sensor, device_class, unit, template),
        value: current,
    })
}
