//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;

use sensors2mqtt_common::{BusClient, LoggingConfig, TopicBuilder, connect, init_tracing};

use crate::BridgeArgs;
use crate::availability::AvailabilityPublisher;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - MQTT connection with the offline last will registered
/// - Running the worker until it fails or a shutdown signal arrives
/// - Publishing offline availability and disconnecting on shutdown
///
/// # Example
///
/// ```ignore
/// use sensors2mqtt_bridge_framework::{BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = MyBridgeConfig::resolve(&args, |_| {})?;
///     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
///
///     runner
///         .run(|publisher| async move { my_worker(publisher).await })
///         .await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// The resolved configuration.
    config: C,
    /// Bus connection.
    client: Arc<dyn BusClient>,
    /// Publisher handed to the worker.
    publisher: Publisher,
    /// Availability reporting.
    availability: AvailabilityPublisher,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner with CLI args for log level override.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Connect to the MQTT broker, registering the offline last will
    /// 3. Create the publisher
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();

        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: config.logging().format,
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = env!("CARGO_PKG_VERSION"), "Starting bridge");

        let topics = Self::topics(&config);
        let will = AvailabilityPublisher::last_will(topics.availability())?;
        let session = connect(config.mqtt(), Some(will)).await?;

        Ok(Self::with_client(name, config, Arc::new(session)))
    }

    /// Create a runner on top of an existing bus client.
    ///
    /// Does not initialize logging.
    pub fn with_client(name: impl Into<String>, config: C, client: Arc<dyn BusClient>) -> Self {
        let publisher = Publisher::new(client.clone(), Self::topics(&config));
        let availability = AvailabilityPublisher::new(publisher.clone());

        Self {
            name: name.into(),
            config,
            client,
            publisher,
            availability,
        }
    }

    fn topics(config: &C) -> TopicBuilder {
        TopicBuilder::with_discovery_prefix(config.root_topic(), config.discovery_prefix())
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Run the worker until it returns or a shutdown signal is received.
    ///
    /// Shutdown signals are SIGINT, SIGTERM, SIGUSR1 and SIGUSR2 (Ctrl+C on
    /// other platforms).
    pub async fn run<F, Fut>(self, worker: F) -> Result<()>
    where
        F: FnOnce(Publisher) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.run_until(worker, shutdown_signal()).await
    }

    /// Run the worker until it returns or `shutdown` resolves.
    ///
    /// Afterwards publishes retained offline availability, bounded by the
    /// configured shutdown timeout, and disconnects. The offline publish is
    /// skipped when the worker failed with a fatal error.
    pub async fn run_until<F, Fut, S>(self, worker: F, shutdown: S) -> Result<()>
    where
        F: FnOnce(Publisher) -> Fut,
        Fut: Future<Output = Result<()>>,
        S: Future<Output = std::io::Result<&'static str>>,
    {
        tracing::info!(bridge = %self.name, "Bridge running");

        let outcome = tokio::select! {
            result = worker(self.publisher.clone()) => result,
            signal = shutdown => match signal {
                Ok(signal) => {
                    tracing::info!(bridge = %self.name, signal, "Received shutdown signal");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for shutdown signals");
                    Err(BridgeError::Io(e))
                }
            },
        };

        match &outcome {
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "Bridge stopped, skipping offline availability");
            }
            _ => {
                let timeout = self.config.shutdown_timeout();
                if let Err(e) = self.availability.publish_offline(timeout).await {
                    tracing::warn!(error = %e, "Failed to publish offline availability");
                }
            }
        }

        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "Error disconnecting from MQTT broker");
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        outcome
    }
}

/// Wait for a shutdown signal and return its name.
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut user1 = signal(SignalKind::user_defined1())?;
    let mut user2 = signal(SignalKind::user_defined2())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = user1.recv() => "SIGUSR1",
        _ = user2.recv() => "SIGUSR2",
    };

    Ok(name)
}

/// Wait for a shutdown signal and return its name.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
