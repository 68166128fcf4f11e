// ============================================
// File: crates/aura-core/src/crypto/checksum.rs
// ============================================
//! # Firmware Checksums
//!
//! SHA-256 digests of firmware images, carried to devices in update
//! commands as 64 lower-case hex characters.

use sha2::{Digest, Sha256};

/// Returns the lower-case hex SHA-256 digest of `data`.
///
/// # Example
/// ```
/// use aura_core::crypto::checksum::sha256_hex;
///
/// assert_eq!(
///     sha256_hex(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
