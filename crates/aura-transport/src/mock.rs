// ============================================
// File: crates/aura-transport/src/mock.rs
// ============================================
//! # In-Memory Broker
//!
//! ## Creation Reason
//! Provides a `PubSub` implementation for testing the orchestrator and
//! fleet client without a running MQTT broker.
//!
//! ## Main Functionality
//! - Captures every published message for verification
//! - Injects inbound messages as if a device had published them
//! - Simulated connection loss and publish failures
//!
//! ## Usage in Tests
//! ```
//! use aura_transport::mock::MemoryBroker;
//! use aura_transport::traits::PubSub;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = MemoryBroker::new();
//! broker.publish("aura/devices/x/update/rollback", Bytes::from_static(b"{}")).await?;
//!
//! let captured = broker.take_published();
//! assert_eq!(captured.len(), 1);
//! assert_eq!(captured[0].topic, "aura/devices/x/update/rollback");
//! # Ok(())
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - `inject` dispatches synchronously on the caller's task
//!
//! ## Last Modified
//! v0.1.0 - Initial in-memory broker

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Result, TransportError};
use crate::registry::SubscriptionRegistry;
use crate::traits::{MessageHandler, PubSub};

// ============================================
// Constants
// ============================================

/// Maximum number of captured publishes.
const MAX_CAPTURED: usize = 10_000;

// ============================================
// PublishedMessage
// ============================================

/// A message captured by [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination topic.
    pub topic: String,
    /// Raw payload.
    pub payload: Bytes,
}

// ============================================
// MemoryBroker
// ============================================

/// In-memory `PubSub` for tests.
///
/// Published messages are captured, not delivered to local subscribers;
/// devices are simulated through [`MemoryBroker::inject`].
pub struct MemoryBroker {
    published: Mutex<VecDeque<PublishedMessage>>,
    registry: SubscriptionRegistry,
    connected: AtomicBool,
    failing_topics: Mutex<HashSet<String>>,
}

impl MemoryBroker {
    /// Creates a connected broker with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            published: Mutex::new(VecDeque::with_capacity(64)),
            registry: SubscriptionRegistry::new(),
            connected: AtomicBool::new(true),
            failing_topics: Mutex::new(HashSet::new()),
        }
    }

    /// Delivers `payload` on `topic` to matching subscribers.
    ///
    /// Returns the number of handlers invoked.
    pub fn inject(&self, topic: &str, payload: impl AsRef<[u8]>) -> usize {
        self.registry.dispatch(topic, payload.as_ref())
    }

    /// Takes all captured publishes, clearing the capture buffer.
    #[must_use]
    pub fn take_published(&self) -> Vec<PublishedMessage> {
        self.published.lock().drain(..).collect()
    }

    /// Returns captured publishes whose topic ends with `suffix`.
    #[must_use]
    pub fn published_with_suffix(&self, suffix: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic.ends_with(suffix))
            .cloned()
            .collect()
    }

    /// Number of captured publishes.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.published.lock().len()
    }

    /// Registered subscription filters.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.registry.filters()
    }

    /// Simulates connection loss or recovery.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes every publish to `topic` fail.
    pub fn fail_topic(&self, topic: impl Into<String>) {
        self.failing_topics.lock().insert(topic.into());
    }

    /// Lets publishes to `topic` succeed again.
    pub fn restore_topic(&self, topic: &str) {
        self.failing_topics.lock().remove(topic);
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSub for MemoryBroker {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.failing_topics.lock().contains(topic) {
            return Err(TransportError::publish_failed(topic, "simulated failure"));
        }

        let mut published = self.published.lock();
        if published.len() >= MAX_CAPTURED {
            return Err(TransportError::publish_failed(topic, "capture buffer full"));
        }
        published.push_back(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str, handler: MessageHandler) -> Result<()> {
        self.registry.register(filter, handler);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================
// Tests
// ============================================
