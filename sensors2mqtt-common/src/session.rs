//! MQTT session management.
//!
//! [`connect`] opens a `rumqttc` client and drives its event loop in a background
//! task. Publishes wait for the broker acknowledgment: outgoing publish requests are
//! written to the connection in the order they were queued, so pending
//! acknowledgments are matched to packet ids in FIFO order.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::bus::{BusClient, PublishOptions, Qos};
use crate::config::MqttConfig;
use crate::error::{Error, Result};

/// Delay before the event loop is polled again after a connection error.
/// Polling again makes `rumqttc` reconnect.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long [`MqttSession::disconnect`] waits for the DISCONNECT to be sent.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Message the broker publishes on our behalf if the connection drops uncleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
    pub options: PublishOptions,
}

type AckResult = std::result::Result<(), String>;

/// A publish waiting to be written to the connection.
#[derive(Debug)]
struct QueuedAck {
    id: u64,
    qos: Qos,
    tx: oneshot::Sender<AckResult>,
}

/// Matches queued publishes to broker acknowledgments.
#[derive(Debug, Default)]
struct AckTracker {
    queued: VecDeque<QueuedAck>,
    inflight: HashMap<u16, oneshot::Sender<AckResult>>,
}

impl AckTracker {
    fn enqueue(&mut self, id: u64, qos: Qos) -> oneshot::Receiver<AckResult> {
        let (tx, rx) = oneshot::channel();
        self.queued.push_back(QueuedAck { id, qos, tx });
        rx
    }

    /// Drop a queued publish the client refused to accept.
    fn cancel(&mut self, id: u64) {
        self.queued.retain(|q| q.id != id);
    }

    /// The oldest queued publish was written to the connection with `pkid`.
    fn on_outgoing(&mut self, pkid: u16) {
        let Some(queued) = self.queued.pop_front() else {
            return;
        };

        if queued.qos == Qos::AtMostOnce {
            let _ = queued.tx.send(Ok(()));
        } else {
            self.inflight.insert(pkid, queued.tx);
        }
    }

    /// PUBACK (QoS 1) or PUBCOMP (QoS 2) received.
    fn on_ack(&mut self, pkid: u16) {
        if let Some(tx) = self.inflight.remove(&pkid) {
            let _ = tx.send(Ok(()));
        }
    }

    /// Fail everything that is pending.
    fn fail_all(&mut self, reason: &str) -> usize {
        let count = self.queued.len() + self.inflight.len();
        for queued in self.queued.drain(..) {
            let _ = queued.tx.send(Err(reason.to_string()));
        }
        for (_, tx) in self.inflight.drain() {
            let _ = tx.send(Err(reason.to_string()));
        }
        count
    }
}

#[derive(Debug)]
struct SessionState {
    connected: AtomicBool,
    connected_tx: watch::Sender<bool>,
    acks: Mutex<AckTracker>,
    next_id: AtomicU64,
}

impl SessionState {
    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.connected_tx.send_replace(connected);
    }

    fn with_acks<R>(&self, f: impl FnOnce(&mut AckTracker) -> R) -> R {
        let mut acks = self.acks.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut acks)
    }

    fn handle_event(&self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                if ack.code == ConnectReturnCode::Success {
                    tracing::info!(session_present = ack.session_present, "MQTT connected");
                    self.set_connected(true);
                } else {
                    tracing::error!(code = ?ack.code, "MQTT broker refused connection");
                    self.set_connected(false);
                }
            }
            Event::Incoming(Packet::PubAck(ack)) => self.with_acks(|a| a.on_ack(ack.pkid)),
            Event::Incoming(Packet::PubComp(comp)) => self.with_acks(|a| a.on_ack(comp.pkid)),
            Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect) => {
                self.set_connected(false);
            }
            Event::Outgoing(Outgoing::Publish(pkid)) => self.with_acks(|a| a.on_outgoing(pkid)),
            _ => {}
        }
    }
}

/// An MQTT session implementing [`BusClient`].
#[derive(Debug)]
pub struct MqttSession {
    client: AsyncClient,
    state: Arc<SessionState>,
    ack_timeout: Duration,
    driver: JoinHandle<()>,
}

/// Connect to the MQTT broker using the provided configuration.
///
/// Waits until the broker accepted the connection or the connect timeout elapsed.
pub async fn connect(config: &MqttConfig, last_will: Option<LastWill>) -> Result<MqttSession> {
    let endpoint = config.endpoint()?;
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("sensors2mqtt-{}", std::process::id()));

    let mut options = MqttOptions::new(&client_id, &endpoint.host, endpoint.port);
    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);

    if let Some((username, password)) = config.credentials() {
        options.set_credentials(username, password);
    }

    if endpoint.tls {
        options.set_transport(rumqttc::Transport::tls_with_default_config());
    }

    if let Some(will) = last_will {
        options.set_last_will(rumqttc::LastWill::new(
            will.topic,
            will.payload,
            will.options.qos.into(),
            will.options.retain,
        ));
    }

    tracing::info!(
        host = %endpoint.host,
        port = endpoint.port,
        tls = endpoint.tls,
        client_id = %client_id,
        "Connecting to MQTT broker"
    );

    let (client, event_loop) = AsyncClient::new(options, 64);
    let (connected_tx, mut connected_rx) = watch::channel(false);
    let state = Arc::new(SessionState {
        connected: AtomicBool::new(false),
        connected_tx,
        acks: Mutex::new(AckTracker::default()),
        next_id: AtomicU64::new(0),
    });

    let driver = tokio::spawn(drive_event_loop(event_loop, state.clone()));

    let wait = connected_rx.wait_for(|connected| *connected);
    match tokio::time::timeout(config.connect_timeout(), wait).await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) => {
            driver.abort();
            return Err(Error::Connection("MQTT event loop stopped".to_string()));
        }
        Err(_) => {
            driver.abort();
            return Err(Error::Connection(format!(
                "No CONNACK from {}:{} within {}s",
                endpoint.host, endpoint.port, config.connect_timeout_secs
            )));
        }
    }

    Ok(MqttSession {
        client,
        state,
        ack_timeout: config.ack_timeout(),
        driver,
    })
}

async fn drive_event_loop(mut event_loop: EventLoop, state: Arc<SessionState>) {
    loop {
        match event_loop.poll().await {
            Ok(event) => state.handle_event(event),
            Err(e) => {
                let was_connected = state.connected.load(Ordering::SeqCst);
                state.set_connected(false);
                let failed = state.with_acks(|a| a.fail_all(&e.to_string()));

                if was_connected {
                    tracing::warn!(error = %e, failed_publishes = failed, "MQTT connection lost");
                } else {
                    tracing::debug!(error = %e, "MQTT connection attempt failed");
                }

                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl BusClient for MqttSession {
    async fn publish(&self, topic: &str, payload: Vec<u8>, options: PublishOptions) -> Result<()> {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let ack = self.state.with_acks(|a| a.enqueue(id, options.qos));

        if let Err(e) = self
            .client
            .publish(topic, options.qos.into(), options.retain, payload)
            .await
        {
            self.state.with_acks(|a| a.cancel(id));
            return Err(e.into());
        }

        let not_acknowledged = |reason: String| Error::NotAcknowledged {
            topic: topic.to_string(),
            reason,
        };

        match tokio::time::timeout(self.ack_timeout, ack).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(not_acknowledged(reason)),
            Ok(Err(_)) => Err(not_acknowledged("session closed".to_string())),
            Err(_) => Err(not_acknowledged(format!(
                "timed out after {}s",
                self.ack_timeout.as_secs()
            ))),
        }
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut connected_rx = self.state.connected_tx.subscribe();
        self.client.disconnect().await?;

        // The event loop reports the DISCONNECT once it has been written.
        let written = connected_rx.wait_for(|connected| !*connected);
        if tokio::time::timeout(DISCONNECT_TIMEOUT, written).await.is_err() {
            tracing::debug!("DISCONNECT not written before timeout");
        }

        self.state.set_connected(false);
        Ok(())
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
