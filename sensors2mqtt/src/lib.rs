//! Bridge from local hardware sensors to MQTT.
//!
//! Each cycle runs `sensors -j` (lm-sensors) and `nvidia-smi --format=csv`,
//! publishes every device's raw reading, announces each sensor once through
//! Home Assistant MQTT discovery, and reports the bridge as online.
//!
//! # Topics
//!
//! ```text
//! sensors2mqtt/server                                availability
//! sensors2mqtt/lm-sensors/<device>                   raw lm-sensors chip reading
//! sensors2mqtt/nvidia-smi/<device>                   raw nvidia-smi GPU row
//! homeassistant/sensor/<source>_<device>/<sensor>/config   discovery (retained)
//! ```

pub mod config;
pub mod entity;
pub mod lm_sensors;
pub mod nvidia_smi;
pub mod poller;
pub mod source;

pub use config::{SensorsArgs, SensorsBridgeConfig};
pub use poller::{CycleStats, SensorPoller};
pub use source::{CommandSource, ReadingSource, SourceError};
