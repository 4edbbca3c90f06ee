//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Args;

/// Common CLI arguments for all bridges.
///
/// Every broker setting can also be given through the environment, which is how
/// the bridge is usually configured when running in a container.
#[derive(Args, Debug, Clone, Default)]
pub struct BridgeArgs {
    /// Path to an optional JSON5 configuration file.
    #[arg(short, long, env = "SENSORS2MQTT_CONFIG")]
    pub config: Option<PathBuf>,

    /// MQTT broker URL (e.g. mqtt://broker.lan:1883).
    #[arg(long, env = "MQTT_URL")]
    pub mqtt_url: Option<String>,

    /// MQTT username.
    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    /// MQTT password.
    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}
