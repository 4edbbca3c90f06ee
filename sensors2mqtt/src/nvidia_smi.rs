//! nvidia-smi CSV output.
//!
//! ```text
//! name, pci.bus_id, temperature.gpu, utilization.gpu [%], utilization.memory [%], memory.free [MiB], memory.used [MiB]
//! NVIDIA GeForce RTX 3080, 00000000:01:00.0, 45, 12 %, 3 %, 9000 MiB, 1000 MiB
//! ```
//!
//! One device per GPU, keyed by its PCI bus id.

use serde_json::{Map, Value};

use sensors2mqtt_bridge_framework::{DeviceClass, DeviceReading, ReadingTree, SensorValue, Source};

use crate::entity::{Classification, ClassifiedEntity, ClassifyContext, ParseError};

/// Program run by default.
pub const DEFAULT_COMMAND: &str = "nvidia-smi";

/// Arguments passed by default.
pub const DEFAULT_ARGS: &[&str] = &[
    "--query-gpu=gpu_name,gpu_bus_id,temperature.gpu,utilization.gpu,utilization.memory,memory.free,memory.used",
    "--format=csv",
];

/// Column identifying a GPU.
pub const KEY_COLUMN: &str = "pci.bus_id";

/// Column holding the GPU model.
pub const MODEL_COLUMN: &str = "name";

/// A header column, split into its name and unit.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    name: String,
    unit: Option<String>,
}

impl Column {
    /// Parse `utilization.gpu [%]` into `utilization.gpu` and `%`.
    fn parse(header: &str) -> Self {
        let header = header.trim();
        let split = header
            .strip_suffix(']')
            .and_then(|rest| rest.rsplit_once(" ["));

        match split {
            Some((name, unit)) => Self {
                name: name.trim().to_string(),
                unit: Some(unit.to_string()),
            },
            None => Self {
                name: header.to_string(),
                unit: None,
            },
        }
    }

    /// Remove this column's unit from a field.
    fn strip_unit<'a>(&self, field: &'a str) -> &'a str {
        let field = field.trim();
        match &self.unit {
            Some(unit) => field
                .strip_suffix(unit.as_str())
                .and_then(|rest| rest.strip_suffix(' '))
                .unwrap_or(field),
            None => field,
        }
    }
}

/// Parse `nvidia-smi --format=csv` output.
///
/// Rows whose field count differs from the header are skipped. When two rows
/// share a bus id the later one is kept.
pub fn parse(output: &str) -> Result<ReadingTree, ParseError> {
    let mut tree = ReadingTree::new(Source::NvidiaSmi);
    let mut lines = output.lines().filter(|line| !line.trim().is_empty());

    let Some(header) = lines.next() else {
        return Ok(tree);
    };

    let columns: Vec<Column> = header.split(',').map(Column::parse).collect();
    let key = columns
        .iter()
        .position(|c| c.name == KEY_COLUMN)
        .ok_or(ParseError::MissingKeyColumn { column: KEY_COLUMN })?;

    for row in lines {
        let fields: Vec<&str> = row.split(',').collect();
        if fields.len() != columns.len() {
            tracing::debug!(
                row,
                fields = fields.len(),
                columns = columns.len(),
                "Skipping nvidia-smi row with mismatched field count"
            );
            continue;
        }

        let mut sensors = Map::new();
        for (column, field) in columns.iter().zip(&fields) {
            sensors.insert(
                column.name.clone(),
                Value::String(column.strip_unit(field).to_string()),
            );
        }

        let bus_id = columns[key].strip_unit(fields[key]).to_string();
        if tree.insert(DeviceReading::new(bus_id.clone(), sensors)).is_some() {
            tracing::warn!(bus_id = %bus_id, "Duplicate GPU bus id, keeping the later row");
        }
    }

    Ok(tree)
}

/// Classify one column of a GPU row.
pub fn classify(ctx: &ClassifyContext<'_>, sensor: &str, value: SensorValue<'_>) -> Classification {
    let (device_class, unit, suffix) = match sensor {
        KEY_COLUMN | MODEL_COLUMN => return Classification::Excluded,
        "temperature.gpu" => (Some(DeviceClass::Temperature), "°C", None),
        "utilization.gpu" | "utilization.memory" => (None, "%", Some("%")),
        "memory.free" | "memory.used" => (None, "MiB", Some("MiB")),
        _ => {
            return Classification::Unclassifiable {
                reason: "unknown nvidia-smi column",
            };
        }
    };

    let current = value.as_text().map(|text| {
        let text = text.trim();
        suffix
            .and_then(|suffix| text.strip_suffix(suffix))
            .unwrap_or(text)
            .trim()
            .to_string()
    });

    let template = format!("{{{{ value_json[\"{sensor}\"] }}}}");

    Classification::Entity(ClassifiedEntity {
        descriptor: ctx.descriptor(sensor, device_class, unit, template),
        value: current,
    })
}
