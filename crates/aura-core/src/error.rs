// ============================================
// File: crates/aura-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types specific to PKI, challenge cryptography and
//! wire-protocol operations in the Aura core crate.
//!
//! ## Error Categories
//! 1. **Crypto Errors**: Key generation, certificate signing, signature checks
//! 2. **Protocol Errors**: Message parsing, topic layout
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - All errors should be loggable without leaking secrets
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use aura_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for PKI, cryptographic and protocol operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Failed to generate a key pair.
    #[error("Key generation failed: {context}")]
    KeyGeneration {
        /// What key was being generated
        context: String,
    },

    /// Failed to build or sign a certificate.
    #[error("Certificate signing failed: {reason}")]
    CertificateSigning {
        /// Why signing failed
        reason: String,
    },

    /// Stored CA material could not be loaded.
    #[error("Failed to load CA material: {reason}")]
    CertificateLoad {
        /// Why loading failed
        reason: String,
    },

    /// Public key bytes are malformed.
    #[error("Invalid public key: {reason}")]
    InvalidKey {
        /// Why the key was rejected
        reason: String,
    },

    /// Signature did not verify.
    #[error("Signature verification failed")]
    SignatureVerification,

    // ========================================
    // Protocol Errors
    // ========================================

    /// Message could not be parsed.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What's wrong with the message
        reason: String,
    },

    /// Topic does not follow the device topic layout.
    #[error("Unrecognized topic: {topic}")]
    UnrecognizedTopic {
        /// The offending topic
        topic: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `KeyGeneration` error.
    pub fn key_generation(context: impl Into<String>) -> Self {
        Self::KeyGeneration {
            context: context.into(),
        }
    }

    /// Creates a `CertificateSigning` error.
    pub fn certificate_signing(reason: impl Into<String>) -> Self {
        Self::CertificateSigning {
            reason: reason.into(),
        }
    }

    /// Creates a `CertificateLoad` error.
    pub fn certificate_load(reason: impl Into<String>) -> Self {
        Self::CertificateLoad {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidKey` error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the error was caused by caller-supplied data.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidKey { .. }
            | Self::SignatureVerification
            | Self::MalformedMessage { .. }
            | Self::UnrecognizedTopic { .. }
            | Self::Common(_) => true,
            _ => false,
        }
    }
}

impl From<rcgen::Error> for CoreError {
    fn from(err: rcgen::Error) -> Self {
        Self::CertificateSigning {
            reason: err.to_string(),
        }
    }
}

// ============================================
// Tests
// ============================================
