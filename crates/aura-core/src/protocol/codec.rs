// ============================================
// File: crates/aura-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Provides JSON serialization and deserialization for device messages so
//! that the transport only ever moves opaque byte payloads.
//!
//! ## Main Functionality
//! - `Codec` trait: Generic encode/decode interface
//! - `JsonCodec`: Implementation for every [`WireMessage`]
//!
//! ## Parsing Strategy
//! 1. Reject empty payloads
//! 2. Parse with `serde_json` (unknown keys ignored)
//! 3. Map failures to `MalformedMessage` naming the message kind
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never log raw payloads at info level; devices may send junk
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use crate::error::{CoreError, Result};
use crate::protocol::messages::WireMessage;

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol messages.
///
/// # Type Parameters
/// * `T` - The message type to encode/decode
pub trait Codec<T> {
    /// Encodes a message into bytes.
    ///
    /// # Errors
    /// Returns `MalformedMessage` if the message cannot be serialized.
    fn encode(&self, msg: &T) -> Result<Vec<u8>>;

    /// Decodes a message from bytes.
    ///
    /// # Errors
    /// Returns `MalformedMessage` if the payload is not a valid message.
    fn decode(&self, buf: &[u8]) -> Result<T>;
}

// ============================================
// JsonCodec
// ============================================

/// JSON codec for all device messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<T: WireMessage> Codec<T> for JsonCodec {
    fn encode(&self, msg: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(msg)
            .map_err(|e| CoreError::malformed(format!("encode {}: {e}", T::KIND)))
    }

    fn decode(&self, buf: &[u8]) -> Result<T> {
        if buf.is_empty() {
            return Err(CoreError::malformed(format!("empty {} payload", T::KIND)));
        }
        serde_json::from_slice(buf)
            .map_err(|e| CoreError::malformed(format!("decode {}: {e}", T::KIND)))
    }
}

// ============================================
// Convenience Functions
// ============================================

/// Encodes any device message to JSON bytes.
///
/// # Errors
/// See [`Codec::encode`].
pub fn encode_message<T: WireMessage>(msg: &T) -> Result<Vec<u8>> {
    JsonCodec.encode(msg)
}

/// Decodes any device message from JSON bytes.
///
/// # Errors
/// See [`Codec::decode`].
pub fn decode_message<T: WireMessage>(buf: &[u8]) -> Result<T> {
    JsonCodec.decode(buf)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{
        DeviceTelemetry, RollbackDirective, UpdateCommand, UpdateOutcome, UpdateStatus,
    };
    use aura_common::DeviceId;

    #[test]
    fn test_update_command_wire_keys() {
        let id = DeviceId::generate();
        let cmd = UpdateCommand {
            device_id: id,
            firmware_url: "https://fw.example.com/1.bin".into(),
            version: "1.2.0".into(),
            checksum: "ab".repeat(32),
        };

        let value: serde_json::Value =
            serde_json::from_slice(&encode_message(&cmd).unwrap()).unwrap();
        assert_eq!(value["device_id"], id.to_string());
        assert_eq!(value["firmware_url"], "https://fw.example.com/1.bin");
        assert_eq!(value["version"], "1.2.0");
    }

    #[test]
    fn test_rollback_payload_is_exact() {
        let bytes = encode_message(&RollbackDirective::default()).unwrap();
        assert_eq!(bytes, br#"{"action":"rollback"}"#);
    }

    #[test]
    fn test_telemetry_omits_absent_fields() {
        let msg = DeviceTelemetry {
            device_id: DeviceId::generate(),
            timestamp: 1_700_000_000,
            battery_level: Some(87.5),
            temperature: None,
            uptime: None,
            firmware_version: None,
            status: "online".into(),
        };
        let text = String::from_utf8(encode_message(&msg).unwrap()).unwrap();
        assert!(text.contains("battery_level"));
        assert!(!text.contains("temperature"));
        assert!(!text.contains("null"));
    }

    #[test]
    fn test_decode_accepts_camel_case() {
        let id = DeviceId::generate();
        let raw = format!(r#"{{"deviceId":"{id}","status":"completed","progress":100}}"#);
        let status: UpdateStatus = decode_message(raw.as_bytes()).unwrap();
        assert_eq!(status.device_id, id);
        assert_eq!(status.outcome(), UpdateOutcome::Succeeded);
        assert!(status.error.is_none());
    }

    #[test]
    fn test_decode_missing_progress_defaults() {
        let id = DeviceId::generate();
        let raw = format!(r#"{{"device_id":"{id}","status":"failed","error":"flash write"}}"#);
        let status: UpdateStatus = decode_message(raw.as_bytes()).unwrap();
        assert_eq!(status.progress, 0);
        assert_eq!(status.error.as_deref(), Some("flash write"));
    }

    #[test]
    fn test_decode_malformed() {
        let err = decode_message::<UpdateStatus>(b"{not json").unwrap_err();
        assert!(matches!(err, CoreError::MalformedMessage { .. }));
        assert!(err.to_string().contains("update status"));

        let err = decode_message::<DeviceTelemetry>(b"").unwrap_err();
        assert!(err.to_string().contains("empty telemetry"));
    }
}
