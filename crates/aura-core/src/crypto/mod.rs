// ============================================
// File: crates/aura-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes the cryptographic operations of the Aura platform, using
//! audited implementations (rcgen/ring, ed25519-dalek, RustCrypto sha2).
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`ca`]: Platform root CA and device certificate issuance
//! - [`signature`]: Ed25519 verification of signed enrollment challenges
//! - [`checksum`]: SHA-256 firmware digests
//!
//! ## Enrollment Cryptography
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Device                                        Server       │
//! │    │  bootstrap token ───────────────────────────► │        │
//! │    │ ◄─────────────────────────── challenge (256b) │        │
//! │    │  Ed25519(challenge) [+ public key] ─────────► │        │
//! │    │                                     verify    │        │
//! │    │                               issue leaf cert │        │
//! │    │ ◄──────────── leaf cert + key + root cert     │        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER implement custom crypto primitives
//! - Private key PEMs are wrapped in `Zeroizing`
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto module

pub mod ca;
pub mod checksum;
pub mod signature;

pub use ca::{CaSettings, CertificateAuthority, IssuedCertificate};
pub use checksum::sha256_hex;
pub use signature::{verify_challenge_signature, DevicePublicKey};
