//! In-memory [`BusClient`] for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::bus::{BusClient, PublishOptions};
use crate::error::{Error, Result};

/// A message recorded by [`MemoryBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub options: PublishOptions,
}

impl PublishedMessage {
    /// Decode the payload as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// Records every publish instead of sending it anywhere.
#[derive(Debug)]
pub struct MemoryBus {
    connected: AtomicBool,
    messages: Mutex<Vec<PublishedMessage>>,
    failing_prefixes: Mutex<Vec<String>>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    /// Create a connected bus.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            messages: Mutex::new(Vec::new()),
            failing_prefixes: Mutex::new(Vec::new()),
        }
    }

    /// Simulate the broker connection going up or down.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make publishes to topics starting with `prefix` fail.
    pub fn fail_topics_starting_with(&self, prefix: impl Into<String>) {
        self.failing_prefixes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prefix.into());
    }

    /// Stop failing publishes.
    pub fn clear_failures(&self) {
        self.failing_prefixes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Messages recorded so far.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Remove and return the messages recorded so far.
    pub fn take(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Topics of the messages recorded so far, in publish order.
    pub fn topics(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.topic).collect()
    }
}

#[async_trait]
impl BusClient for MemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>, options: PublishOptions) -> Result<()> {
        let failing = self
            .failing_prefixes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|p| topic.starts_with(p.as_str()));

        if failing || !self.is_connected() {
            return Err(Error::NotAcknowledged {
                topic: topic.to_string(),
                reason: "rejected by memory bus".to_string(),
            });
        }

        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload,
                options,
            });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.set_connected(false);
        Ok(())
    }
}
