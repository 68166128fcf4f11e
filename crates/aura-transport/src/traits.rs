// ============================================
// File: crates/aura-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the abstract publish/subscribe interface so the orchestrator can
//! run against a real broker in production and an in-memory broker in
//! tests.
//!
//! ## Main Functionality
//! - `PubSub`: publish/subscribe/disconnect interface
//! - `MessageHandler`: callback invoked for each inbound message
//! - `MqttConfig`: broker connection settings
//!
//! ## Design Philosophy
//! - Traits enable mock implementations for testing
//! - Async-first design with `async_trait`
//! - Payloads are opaque bytes; encoding lives in `FleetClient`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers are called on the transport's event-loop task; they must not
//!   block and must not hold locks across `.await`
//! - Implementations must be Send + Sync for use in async contexts
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, TransportError};

/// Default MQTT client identifier for the orchestrator.
pub const DEFAULT_CLIENT_ID: &str = "aura-ota-orchestrator";

// ============================================
// MessageHandler
// ============================================

/// Callback invoked with `(topic, payload)` for each inbound message.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

// ============================================
// PubSub Trait
// ============================================

/// Abstract interface for a publish/subscribe session.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to allow sharing across
/// async tasks.
///
/// # Example
/// ```ignore
/// async fn announce<P: PubSub>(bus: &P) -> Result<()> {
///     bus.subscribe("aura/devices/+/telemetry", Arc::new(|topic, payload| {
///         println!("{topic}: {} bytes", payload.len());
///     })).await?;
///     bus.publish("aura/devices/x/update/rollback", Bytes::from_static(b"{}")).await
/// }
/// ```
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publishes `payload` to `topic` with at-least-once delivery.
    ///
    /// # Errors
    /// Returns error if the request could not be handed to the broker.
    /// Failed publishes are not retried.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Registers `handler` for every message matching `filter`.
    ///
    /// The subscription survives reconnects.
    ///
    /// # Errors
    /// Returns error if the subscribe request could not be issued.
    async fn subscribe(&self, filter: &str, handler: MessageHandler) -> Result<()>;

    /// Returns `true` while a broker session is established.
    fn is_connected(&self) -> bool;

    /// Closes the session and stops background work.
    ///
    /// # Errors
    /// Returns error if the disconnect request could not be sent.
    async fn disconnect(&self) -> Result<()>;
}

// ============================================
// MqttConfig
// ============================================

/// Configuration for an MQTT session.
///
/// # Example
/// ```
/// use aura_transport::traits::MqttConfig;
/// use std::time::Duration;
///
/// let config = MqttConfig::new("broker.internal", 8883)
///     .with_credentials("orchestrator", "secret")
///     .with_keep_alive(Duration::from_secs(30))
///     .with_tls(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Optional username/password.
    pub credentials: Option<(String, String)>,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// Delay before the first reconnect attempt.
    pub reconnect_initial: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_max: Duration,
    /// Wrap the connection in TLS.
    pub tls: bool,
    /// Capacity of the request queue between client and event loop.
    pub channel_capacity: usize,
    /// How long a publish may wait for room in the request queue.
    pub publish_timeout: Duration,
}

impl MqttConfig {
    /// Creates a configuration with defaults for the given broker.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            credentials: None,
            keep_alive: Duration::from_secs(60),
            reconnect_initial: Duration::from_secs(5),
            reconnect_max: Duration::from_secs(60),
            tls: false,
            channel_capacity: 64,
            publish_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the client identifier.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets username and password.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub const fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the reconnect backoff bounds.
    #[must_use]
    pub const fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = initial;
        self.reconnect_max = max;
        self
    }

    /// Enables or disables TLS.
    #[must_use]
    pub const fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the request queue capacity and how long a publish waits for
    /// room in it.
    #[must_use]
    pub const fn with_request_queue(mut self, capacity: usize, publish_timeout: Duration) -> Self {
        self.channel_capacity = capacity;
        self.publish_timeout = publish_timeout;
        self
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the reconnect delay after `attempt` consecutive failures.
    ///
    /// Doubles from `reconnect_initial` and saturates at `reconnect_max`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.reconnect_initial
            .checked_mul(factor)
            .map_or(self.reconnect_max, |d| d.min(self.reconnect_max))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TransportError::invalid_config("host", "broker host cannot be empty"));
        }

        if self.port == 0 {
            return Err(TransportError::invalid_config("port", "broker port cannot be 0"));
        }

        if self.client_id.is_empty() {
            return Err(TransportError::invalid_config("client_id", "client id cannot be empty"));
        }

        if self.keep_alive < Duration::from_secs(5) {
            return Err(TransportError::invalid_config(
                "keep_alive",
                "keep-alive must be at least 5 seconds",
            ));
        }

        if self.reconnect_initial.is_zero() || self.reconnect_max < self.reconnect_initial {
            return Err(TransportError::invalid_config(
                "reconnect",
                "backoff must be non-zero and max must be >= initial",
            ));
        }

        if self.channel_capacity == 0 {
            return Err(TransportError::invalid_config(
                "channel_capacity",
                "channel capacity must be positive",
            ));
        }

        if self.publish_timeout.is_zero() {
            return Err(TransportError::invalid_config(
                "publish_timeout",
                "publish timeout must be non-zero",
            ));
        }

        Ok(())
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self::new("localhost", 1883)
    }
}

// ============================================
// Tests
// ============================================
