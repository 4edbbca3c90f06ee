//! MQTT bridge for lm-sensors and nvidia-smi.
//!
//! This bridge polls the local hardware monitoring tools and publishes their
//! readings with Home Assistant discovery.

use anyhow::Result;
use clap::Parser;
use sensors2mqtt_bridge_framework::BridgeRunner;

use sensors2mqtt::config::{SensorsArgs, SensorsBridgeConfig};
use sensors2mqtt::poller::SensorPoller;

#[tokio::main]
async fn main() -> Result<()> {
    let args = SensorsArgs::parse();

    // Invalid configuration fails before connecting
    let config = SensorsBridgeConfig::from_args(&args)?;
    let hostname = config.get_hostname();
    let poller = SensorPoller::from_config(&config.sensors, hostname);

    let runner = BridgeRunner::new_with_args("sensors2mqtt", config, Some(&args.bridge)).await?;

    tracing::info!(
        prefix = %runner.config().sensors.root_topic,
        interval_ms = runner.config().sensors.interval_ms,
        "Sensors bridge running"
    );

    // Run until a shutdown signal or a lost connection
    runner.run(|publisher| poller.run(publisher)).await?;

    Ok(())
}
