// ============================================
// File: crates/aura-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types specific to the publish/subscribe layer including
//! broker connectivity and message (de)serialization.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Error conversion from client and codec errors
//! - Categorization of retryable vs fatal errors
//!
//! ## Error Categories
//! 1. **Broker Errors**: Connect/publish/subscribe failures
//! 2. **Configuration Errors**: Invalid host, port, client id
//! 3. **Codec Errors**: Payloads that do not serialize
//!
//! ## ⚠️ Important Note for Next Developer
//! - Broker errors are usually transient; reconnect is handled by the
//!   event loop, so callers only see the failure of their own request
//! - Never put payload bytes in error messages
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use aura_common::error::CommonError;
use aura_core::error::CoreError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Broker Errors
    // ========================================

    /// Could not reach or handshake with the broker.
    #[error("Failed to connect to broker {broker}: {reason}")]
    ConnectFailed {
        /// Broker address as `host:port`
        broker: String,
        /// Why the connection failed
        reason: String,
    },

    /// A publish request was rejected.
    #[error("Failed to publish to '{topic}': {reason}")]
    PublishFailed {
        /// Destination topic
        topic: String,
        /// Why publish failed
        reason: String,
    },

    /// A subscribe request was rejected.
    #[error("Failed to subscribe to '{filter}': {reason}")]
    SubscribeFailed {
        /// Topic filter
        filter: String,
        /// Why subscribe failed
        reason: String,
    },

    /// No broker session is currently established.
    #[error("Not connected to broker")]
    NotConnected,

    /// The client has been shut down.
    #[error("Transport is shutting down")]
    ShuttingDown,

    // ========================================
    // Configuration Errors
    // ========================================

    /// Invalid configuration.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig {
        /// Configuration field name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Payload could not be encoded.
    #[error(transparent)]
    Codec(#[from] CoreError),

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(broker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            broker: broker.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `PublishFailed` error.
    pub fn publish_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `SubscribeFailed` error.
    pub fn subscribe_failed(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    ///
    /// Transient errors may succeed once the event loop has reconnected.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectFailed { .. }
            | Self::PublishFailed { .. }
            | Self::SubscribeFailed { .. }
            | Self::NotConnected => true,
            _ => false,
        }
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<rumqttc::ClientError> for TransportError {
    fn from(err: rumqttc::ClientError) -> Self {
        // Awaiting requests fail only once the event loop is gone; `try_`
        // requests also fail while the request queue is full.
        match err {
            rumqttc::ClientError::Request(_) => Self::ShuttingDown,
            rumqttc::ClientError::TryRequest(_) => Self::NotConnected,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::publish_failed("aura/devices/x/update/command", "queue closed");
        assert!(err.to_string().contains("aura/devices/x/update/command"));
        assert!(err.to_string().contains("queue closed"));
    }

    #[test]
    fn test_error_classification() {
        let err = TransportError::connect_failed("localhost:1883", "refused");
        assert!(err.is_retryable());
        assert!(TransportError::NotConnected.is_retryable());

        let err = TransportError::invalid_config("port", "must be non-zero");
        assert!(!err.is_retryable());

        assert!(!TransportError::ShuttingDown.is_retryable());
    }

    #[test]
    fn test_codec_error_conversion() {
        let err: TransportError = CoreError::malformed("bad json").into();
        assert!(matches!(err, TransportError::Codec(_)));
        assert!(!err.is_retryable());
    }
}
