// ============================================
// File: crates/aura-transport/src/fleet.rs
// ============================================
//! # Fleet Client
//!
//! ## Creation Reason
//! The orchestrator speaks in devices and firmware, not topics and bytes.
//! `FleetClient` layers the topic layout and JSON codec over any `PubSub`.
//!
//! ## Main Functionality
//! - `publish_update_command`: tell one device to install an image
//! - `publish_rollback_command`: tell one device to revert
//! - `subscribe_to_telemetry` / `subscribe_to_update_status`: typed handlers
//!   over the fleet-wide wildcard topics
//!
//! ## Inbound Handling
//! ```text
//! raw (topic, payload)
//!   → parse topic     (unknown layout  → warn, drop)
//!   → decode JSON     (malformed       → warn, drop)
//!   → id check        (topic ≠ payload → warn, drop)
//!   → typed handler
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Inbound errors are never returned to anyone; the publisher is a device
//! - Outbound failures are returned and not retried
//!
//! ## Last Modified
//! v0.1.0 - Initial fleet client

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use aura_common::DeviceId;
use aura_core::protocol::{
    decode_message, encode_message, DeviceTelemetry, RollbackDirective, TopicKind, TopicLayout,
    UpdateCommand, UpdateStatus, WireMessage,
};

use crate::error::Result;
use crate::traits::{MessageHandler, PubSub};

// ============================================
// FleetClient
// ============================================

/// Typed device messaging over a [`PubSub`] session.
#[derive(Clone)]
pub struct FleetClient {
    bus: Arc<dyn PubSub>,
    layout: TopicLayout,
}

impl FleetClient {
    /// Creates a client over `bus` using `layout` for topic names.
    #[must_use]
    pub fn new(bus: Arc<dyn PubSub>, layout: TopicLayout) -> Self {
        Self { bus, layout }
    }

    /// Returns the topic layout.
    #[must_use]
    pub const fn layout(&self) -> &TopicLayout {
        &self.layout
    }

    /// Returns `true` while the underlying session is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }

    /// Publishes an update command to one device.
    ///
    /// # Errors
    /// Returns error if encoding or publishing fails.
    pub async fn publish_update_command(
        &self,
        device_id: &DeviceId,
        firmware_url: &str,
        version: &str,
        checksum: &str,
    ) -> Result<()> {
        let command = UpdateCommand {
            device_id: *device_id,
            firmware_url: firmware_url.to_string(),
            version: version.to_string(),
            checksum: checksum.to_string(),
        };
        let topic = self.layout.topic(TopicKind::UpdateCommand, device_id);
        self.send(&topic, &command).await?;

        debug!(device_id = %device_id, version = %version, "Published update command");
        Ok(())
    }

    /// Publishes the rollback directive to one device.
    ///
    /// # Errors
    /// Returns error if publishing fails.
    pub async fn publish_rollback_command(&self, device_id: &DeviceId) -> Result<()> {
        let topic = self.layout.topic(TopicKind::Rollback, device_id);
        self.send(&topic, &RollbackDirective::default()).await?;

        debug!(device_id = %device_id, "Published rollback command");
        Ok(())
    }

    /// Invokes `handler` once per well-formed telemetry message from any
    /// device.
    ///
    /// # Errors
    /// Returns error if the subscription cannot be registered.
    pub async fn subscribe_to_telemetry<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(DeviceTelemetry) + Send + Sync + 'static,
    {
        let filter = self.layout.wildcard(TopicKind::Telemetry);
        let raw = typed_handler::<DeviceTelemetry, _, _>(
            self.layout.clone(),
            TopicKind::Telemetry,
            handler,
            |m| m.device_id,
        );
        self.bus.subscribe(&filter, raw).await
    }

    /// Invokes `handler` once per well-formed update-status message from any
    /// device.
    ///
    /// # Errors
    /// Returns error if the subscription cannot be registered.
    pub async fn subscribe_to_update_status<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(UpdateStatus) + Send + Sync + 'static,
    {
        let filter = self.layout.wildcard(TopicKind::UpdateStatus);
        let raw = typed_handler::<UpdateStatus, _, _>(
            self.layout.clone(),
            TopicKind::UpdateStatus,
            handler,
            |m| m.device_id,
        );
        self.bus.subscribe(&filter, raw).await
    }

    /// Closes the underlying session.
    ///
    /// # Errors
    /// Returns error if the session reports a disconnect failure.
    pub async fn disconnect(&self) -> Result<()> {
        self.bus.disconnect().await
    }

    async fn send<T: WireMessage>(&self, topic: &str, message: &T) -> Result<()> {
        let payload = encode_message(message)?;
        self.bus.publish(topic, Bytes::from(payload)).await
    }
}

impl std::fmt::Debug for FleetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetClient")
            .field("prefix", &self.layout.prefix())
            .field("connected", &self.bus.is_connected())
            .finish()
    }
}

/// Wraps a typed handler into a raw [`MessageHandler`] that drops anything
/// it cannot attribute to a device.
fn typed_handler<T, F, G>(layout: TopicLayout, kind: TopicKind, handler: F, id_of: G) -> MessageHandler
where
    T: WireMessage,
    F: Fn(T) + Send + Sync + 'static,
    G: Fn(&T) -> DeviceId + Send + Sync + 'static,
{
    Arc::new(move |topic: &str, payload: &[u8]| {
        let topic_device = match layout.parse(topic) {
            Ok((id, k)) if k == kind => id,
            Ok(_) | Err(_) => {
                warn!(topic = %topic, "Dropping message on unexpected topic");
                return;
            }
        };

        let message: T = match decode_message(payload) {
            Ok(m) => m,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Dropping malformed {}", T::KIND);
                return;
            }
        };

        let payload_device = id_of(&message);
        if payload_device != topic_device {
            warn!(
                topic = %topic,
                payload_device_id = %payload_device,
                "Dropping {} with mismatched device id",
                T::KIND
            );
            return;
        }

        handler(message);
    })
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryBroker;
    use aura_core::protocol::UpdateOutcome;
    use parking_lot::Mutex;

    fn client() -> (Arc<MemoryBroker>, FleetClient) {
        let broker = Arc::new(MemoryBroker::new());
        let fleet = FleetClient::new(broker.clone(), TopicLayout::default());
        (broker, fleet)
    }

    #[tokio::test]
    async fn test_update_command_topic_and_payload() {
        let (broker, fleet) = client();
        let id = DeviceId::generate();

        fleet
            .publish_update_command(&id, "https://fw/1.bin", "1.0.1", &"0".repeat(64))
            .await
            .unwrap();

        let sent = broker.take_published();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, format!("aura/devices/{id}/update/command"));

        let cmd: UpdateCommand = decode_message(&sent[0].payload).unwrap();
        assert_eq!(cmd.device_id, id);
        assert_eq!(cmd.version, "1.0.1");
    }

    #[tokio::test]
    async fn test_rollback_command() {
        let (broker, fleet) = client();
        let id = DeviceId::generate();

        fleet.publish_rollback_command(&id).await.unwrap();

        let sent = broker.take_published();
        assert_eq!(sent[0].topic, format!("aura/devices/{id}/update/rollback"));
        assert_eq!(&sent[0].payload[..], br#"{"action":"rollback"}"#);
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported() {
        let (broker, fleet) = client();
        let id = DeviceId::generate();
        broker.fail_topic(format!("aura/devices/{id}/update/command"));

        let result = fleet.publish_update_command(&id, "u", "v", "c").await;
        assert!(result.is_err());
        assert_eq!(broker.published_count(), 0);
    }

    #[tokio::test]
    async fn test_status_subscription_delivers_and_drops() {
        let (broker, fleet) = client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        fleet
            .subscribe_to_update_status(move |status| sink.lock().push(status))
            .await
            .unwrap();
        assert_eq!(broker.subscriptions(), vec!["aura/devices/+/update/status".to_string()]);

        let id = DeviceId::generate();
        let topic = format!("aura/devices/{id}/update/status");

        // Well-formed
        broker.inject(&topic, format!(r#"{{"device_id":"{id}","status":"completed","progress":100}}"#));
        // Malformed
        broker.inject(&topic, b"not json");
        // Mismatched device id
        let other = DeviceId::generate();
        broker.inject(&topic, format!(r#"{{"device_id":"{other}","status":"failed"}}"#));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].outcome(), UpdateOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_telemetry_subscription() {
        let (broker, fleet) = client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        fleet
            .subscribe_to_telemetry(move |t| sink.lock().push(t))
            .await
            .unwrap();

        let id = DeviceId::generate();
        broker.inject(
            &format!("aura/devices/{id}/telemetry"),
            format!(r#"{{"deviceId":"{id}","timestamp":1,"batteryLevel":55.0,"status":"online"}}"#),
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].battery_level, Some(55.0));
    }
}
