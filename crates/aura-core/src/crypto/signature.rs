// ============================================
// File: crates/aura-core/src/crypto/signature.rs
// ============================================
//! # Device Challenge Signatures
//!
//! ## Creation Reason
//! Provision may carry the device's Ed25519 public key. When it does, the
//! signed challenge must be a valid signature over the challenge text,
//! proving the caller holds the key it is enrolling with.
//!
//! ## Main Functionality
//! - `DevicePublicKey`: parsed Ed25519 verifying key (hex on the wire)
//! - `verify_challenge_signature`: checks a base64 signature over a challenge
//!
//! ## ⚠️ Important Note for Next Developer
//! - The signed message is the challenge exactly as returned by Bootstrap
//!   (its URL-safe base64 text), not the decoded bytes
//! - Verification uses `verify_strict` to reject malleable signatures
//!
//! ## Last Modified
//! v0.1.0 - Initial signature verification

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, VerifyingKey};

use crate::error::{CoreError, Result};

/// Ed25519 public key size in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = 64;

// ============================================
// DevicePublicKey
// ============================================

/// Public Ed25519 key presented by a device during Provision.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DevicePublicKey(VerifyingKey);

impl DevicePublicKey {
    /// Creates a public key from raw bytes.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the bytes are not a valid curve point.
    pub fn from_bytes(bytes: &[u8; ED25519_PUBLIC_KEY_SIZE]) -> Result<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| CoreError::invalid_key(e.to_string()))
    }

    /// Parses a hex encoded public key.
    ///
    /// # Errors
    /// Returns `InvalidKey` for bad hex, wrong length or an invalid point.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| CoreError::invalid_key(format!("hex: {e}")))?;
        let array: [u8; ED25519_PUBLIC_KEY_SIZE] =
            bytes.as_slice().try_into().map_err(|_| {
                CoreError::invalid_key(format!(
                    "expected {ED25519_PUBLIC_KEY_SIZE} bytes, got {}",
                    bytes.len()
                ))
            })?;
        Self::from_bytes(&array)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ED25519_PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Verifies a signature over `message`.
    ///
    /// # Errors
    /// Returns `SignatureVerification` if the signature does not verify.
    pub fn verify(&self, message: &[u8], signature: &[u8; ED25519_SIGNATURE_SIZE]) -> Result<()> {
        let sig = Signature::from_bytes(signature);
        self.0
            .verify_strict(message, &sig)
            .map_err(|_| CoreError::SignatureVerification)
    }
}

impl fmt::Debug for DevicePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_bytes();
        write!(
            f,
            "DevicePublicKey({:02x}{:02x}{:02x}{:02x}...)",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

impl fmt::Display for DevicePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.to_bytes()))
    }
}

// ============================================
// Challenge verification
// ============================================

/// Verifies that `signature_b64` is a signature by `public_key_hex` over
/// the challenge text.
///
/// # Errors
/// - `InvalidKey` if the public key cannot be parsed
/// - `MalformedMessage` if the signature is not 64 bytes of base64
/// - `SignatureVerification` if the signature does not match
pub fn verify_challenge_signature(
    public_key_hex: &str,
    challenge: &str,
    signature_b64: &str,
) -> Result<()> {
    let key = DevicePublicKey::from_hex(public_key_hex)?;

    let raw = BASE64
        .decode(signature_b64.trim())
        .map_err(|e| CoreError::malformed(format!("signature base64: {e}")))?;
    let signature: [u8; ED25519_SIGNATURE_SIZE] = raw.as_slice().try_into().map_err(|_| {
        CoreError::malformed(format!(
            "signature must be {ED25519_SIGNATURE_SIZE} bytes, got {}",
            raw.len()
        ))
    })?;

    key.verify(challenge.as_bytes(), &signature)
}

// ============================================
// Tests
// ============================================
