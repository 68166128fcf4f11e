// ============================================
// File: crates/aura-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Creation Reason
//! Errors raised while wiring and running the server, plus the four
//! caller-facing categories returned by the provisioning RPCs.
//!
//! ## Main Functionality
//! - `ServerError`: startup, configuration, orchestration and wrapped
//!   lower-layer errors
//! - `ProvisioningError`: `invalid_argument`, `not_found`,
//!   `deadline_exceeded`, `internal`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ProvisioningError` messages are sent to devices; keep store and CA
//!   details in the logs, not in the message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use aura_common::error::CommonError;
use aura_core::error::CoreError;
use aura_transport::error::TransportError;

use crate::storage::{BlobError, StoreError};

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Config file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// Config file path
        path: String,
        /// Why loading failed
        reason: String,
    },

    /// Config field failed validation.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Offending field
        field: String,
        /// Why it is invalid
        reason: String,
    },

    /// A component could not be started.
    #[error("Server failed to start: {reason}")]
    StartupFailed {
        /// What failed
        reason: String,
    },

    /// Persisted status/stage pair outside the state table.
    #[error("Release record has invalid state (status={status}, stage={stage})")]
    InvalidReleaseState {
        /// Persisted status
        status: String,
        /// Persisted stage
        stage: String,
    },

    /// State machine rejected a transition.
    #[error("Transition {transition} is not allowed from {state}")]
    InvalidTransition {
        /// Current state
        state: String,
        /// Rejected transition
        transition: String,
    },

    /// Unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong
        message: String,
    },

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Firmware blob store failure.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// Shared validation failure.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// PKI or protocol failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Broker failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Config file could not be read or parsed.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Config field failed validation.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// A component could not be started.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Release state machine rejected a transition.
    pub fn invalid_transition(state: impl ToString, transition: impl ToString) -> Self {
        Self::InvalidTransition {
            state: state.to_string(),
            transition: transition.to_string(),
        }
    }

    /// Unexpected internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for config load/validation errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns `true` if retrying may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

// ============================================
// ProvisioningError
// ============================================

/// Caller-facing provisioning failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    /// Missing/empty field, unknown challenge or bad signature.
    #[error("{0}")]
    InvalidArgument(String),

    /// No enrollable device for the request.
    #[error("{0}")]
    NotFound(String),

    /// The challenge expired before Provision.
    #[error("{0}")]
    DeadlineExceeded(String),

    /// Storage or CA failure.
    #[error("{0}")]
    Internal(String),
}

impl ProvisioningError {
    /// Bad request content.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// No matching device.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Challenge expired.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::DeadlineExceeded(message.into())
    }

    /// Unexpected internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable category name used on the wire.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns `true` unless the failure is internal.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::config_load("/etc/aura/server.toml", "file not found");
        assert!(err.to_string().contains("/etc/aura/server.toml"));
    }

    #[test]
    fn test_error_classification() {
        let config_err = ServerError::config_invalid("orchestrator.canary_size", "must be > 0");
        assert!(config_err.is_config_error());
        assert!(!config_err.is_retryable());

        let state_err = ServerError::invalid_transition("completed", "promote");
        assert!(!state_err.is_config_error());

        let outage: ServerError = TransportError::NotConnected.into();
        assert!(outage.is_retryable());
    }

    #[test]
    fn test_provisioning_codes() {
        assert_eq!(ProvisioningError::invalid_argument("x").code(), "invalid_argument");
        assert_eq!(ProvisioningError::not_found("x").code(), "not_found");
        assert_eq!(ProvisioningError::deadline_exceeded("x").code(), "deadline_exceeded");
        assert_eq!(ProvisioningError::internal("x").code(), "internal");
        assert!(!ProvisioningError::internal("x").is_client_error());
        assert_eq!(ProvisioningError::not_found("no device").to_string(), "no device");
    }
}
