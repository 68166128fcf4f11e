// ============================================
// File: crates/aura-core/src/lib.rs
// ============================================
//! # Aura Core - PKI & Fleet Protocol Library
//!
//! ## Creation Reason
//! Provides the certificate authority, enrollment cryptography and the
//! device message protocol shared by the Aura server and its transport.
//! This crate is the security backbone of device enrollment.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - Root CA generation/restoration and device certificate issuance
//! - Ed25519 challenge signature verification
//! - SHA-256 firmware checksums
//!
//! ### Protocol Module ([`protocol`])
//! - Device message definitions (telemetry, update command/status, rollback)
//! - JSON codec for wire payloads
//! - Per-device topic layout and MQTT filter matching
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 aura-server                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │     aura-core  ◄──      aura-transport             │
//! │   You are here        │                            │
//! │         │             │                            │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │               aura-common                          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Guarantees
//! - **Authenticity**: Device certificates chain to a single root CA
//! - **Proof of possession**: Optional Ed25519 signature over the challenge
//! - **Integrity**: Firmware images carry a SHA-256 checksum
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited implementations (rcgen, dalek, RustCrypto)
//! - NEVER implement custom crypto primitives
//! - Private keys MUST be zeroized when dropped
//! - Message changes MUST stay backward compatible with deployed devices
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use crypto::{
    sha256_hex, verify_challenge_signature, CaSettings, CertificateAuthority, IssuedCertificate,
};
pub use error::{CoreError, Result};
pub use protocol::{
    DeviceTelemetry, RollbackDirective, TopicKind, TopicLayout, UpdateCommand, UpdateOutcome,
    UpdateStatus,
};
