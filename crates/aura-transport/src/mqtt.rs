// ============================================
// File: crates/aura-transport/src/mqtt.rs
// ============================================
//! # MQTT Publish/Subscribe Client
//!
//! ## Creation Reason
//! Provides the production `PubSub` implementation: one persistent MQTT
//! session to the fleet broker that survives broker restarts and network
//! loss.
//!
//! ## Main Functionality
//! - `MqttPubSub`: rumqttc-backed client with a background event loop
//! - Automatic reconnect with exponential backoff
//! - Re-subscription of every registered filter after each ConnAck
//!
//! ## Event Loop
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ loop                                                     │
//! │   select! {                                              │
//! │     shutdown   → exit                                    │
//! │     poll()     → ConnAck  → mark connected, resubscribe  │
//! │                  Publish  → registry.dispatch(handlers)  │
//! │                  Err      → mark disconnected,           │
//! │                             sleep(backoff), retry        │
//! │   }                                                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Publishes wait for room in the request queue, bounded by
//!   `publish_timeout`; a burst larger than the queue is paced by the
//!   event loop instead of dropped
//! - Subscribes issued from the event loop itself use `try_subscribe`,
//!   since awaiting there would wait on the loop's own progress
//! - Connection errors are logged here and never surfaced as fatal
//!
//! ## Last Modified
//! v0.1.0 - Initial MQTT client

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, Transport,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, TransportError};
use crate::registry::SubscriptionRegistry;
use crate::traits::{MessageHandler, MqttConfig, PubSub};

/// How long `disconnect` waits for the event loop to finish.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// Shared State
// ============================================

#[derive(Debug, Default)]
struct Shared {
    connected: AtomicBool,
    registry: SubscriptionRegistry,
}

// ============================================
// MqttPubSub
// ============================================

/// Reconnecting MQTT session.
///
/// # Example
/// ```ignore
/// let bus = MqttPubSub::connect(MqttConfig::new("localhost", 1883))?;
/// bus.publish("aura/devices/x/update/rollback", Bytes::from_static(b"{}")).await?;
/// bus.disconnect().await?;
/// ```
pub struct MqttPubSub {
    client: AsyncClient,
    config: MqttConfig,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttPubSub {
    /// Starts the session and its background event loop.
    ///
    /// Returns immediately; the connection is established (and
    /// re-established) in the background.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration is invalid.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: MqttConfig) -> Result<Self> {
        config.validate()?;

        let (client, eventloop) = AsyncClient::new(build_options(&config), config.channel_capacity);
        let shared = Arc::new(Shared::default());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        info!(
            broker = %config.broker_addr(),
            client_id = %config.client_id,
            tls = config.tls,
            "Starting MQTT session"
        );

        let task = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            config.clone(),
            Arc::clone(&shared),
            shutdown_rx,
        ));

        Ok(Self {
            client,
            config,
            shared,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        })
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &MqttConfig {
        &self.config
    }
}

#[async_trait]
impl PubSub for MqttPubSub {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        let request = self
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec());

        match tokio::time::timeout(self.config.publish_timeout, request).await {
            Ok(Ok(())) => {
                trace!(topic = %topic, bytes = payload.len(), "Queued publish");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(TransportError::publish_failed(
                topic,
                format!(
                    "request queue still full after {}ms",
                    self.config.publish_timeout.as_millis()
                ),
            )),
        }
    }

    async fn subscribe(&self, filter: &str, handler: MessageHandler) -> Result<()> {
        let first = self.shared.registry.register(filter, handler);

        // While offline the filter is picked up by the next ConnAck
        if first && self.is_connected() {
            self.client
                .try_subscribe(filter, QoS::AtLeastOnce)
                .map_err(|e| TransportError::subscribe_failed(filter, e.to_string()))?;
        }

        debug!(filter = %filter, "Registered subscription");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "Disconnect request not delivered");
        }
        let _ = self.shutdown_tx.send(());

        let task = self.task.lock().take();
        if let Some(task) = task {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                warn!("MQTT event loop did not stop in time");
            }
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        info!(broker = %self.config.broker_addr(), "MQTT session closed");
        Ok(())
    }
}

impl std::fmt::Debug for MqttPubSub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttPubSub")
            .field("broker", &self.config.broker_addr())
            .field("connected", &self.is_connected())
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}

// ============================================
// Event Loop
// ============================================

fn build_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);

    if let Some((username, password)) = &config.credentials {
        options.set_credentials(username.clone(), password.clone());
    }
    if config.tls {
        options.set_transport(Transport::tls_with_default_config());
    }
    options
}

fn resubscribe(client: &AsyncClient, shared: &Shared) {
    for filter in shared.registry.filters() {
        match client.try_subscribe(filter.clone(), QoS::AtLeastOnce) {
            Ok(()) => debug!(filter = %filter, "Subscribed"),
            Err(e) => error!(filter = %filter, error = %e, "Failed to resubscribe"),
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    config: MqttConfig,
    shared: Arc<Shared>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("MQTT event loop received shutdown signal");
                break;
            }

            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        failures = 0;
                        shared.connected.store(true, Ordering::SeqCst);
                        info!(broker = %config.broker_addr(), "Connected to MQTT broker");
                        resubscribe(&client, &shared);
                    } else {
                        warn!(code = ?ack.code, "Broker refused connection");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let handled = shared.registry.dispatch(&publish.topic, &publish.payload);
                    trace!(topic = %publish.topic, handlers = handled, "Dispatched message");
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    shared.connected.store(false, Ordering::SeqCst);
                    warn!("Broker closed the session");
                }
                Ok(_) => {}
                Err(e) => {
                    let was_connected = shared.connected.swap(false, Ordering::SeqCst);
                    let delay = config.backoff_delay(failures);
                    failures = failures.saturating_add(1);

                    if was_connected {
                        warn!(error = %e, "Lost connection to MQTT broker");
                    } else {
                        warn!(
                            error = %e,
                            attempt = failures,
                            retry_in_secs = delay.as_secs(),
                            "MQTT connection attempt failed"
                        );
                    }

                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    debug!("MQTT event loop stopped");
}

// ============================================
// Tests
// ============================================
