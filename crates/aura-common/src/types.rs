// ============================================
// File: crates/aura-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the identifier types shared by the provisioning service,
//! the release orchestrator and the device wire protocol, so a device id
//! can never be passed where a release id is expected.
//!
//! ## Main Functionality
//! - `DeviceId`, `FirmwareId`, `ReleaseId`: UUID-backed record identifiers
//! - `Challenge`: 256-bit enrollment challenge (URL-safe base64 on the wire)
//! - Parsing, display and serde implementations
//!
//! ## ⚠️ Important Note for Next Developer
//! - Challenge is security-critical: always generate from a CSPRNG
//! - Challenge zeroizes on drop and never prints its full value in Debug
//! - The textual form of every id is the hyphenated lower-case UUID; the
//!   MQTT topic layout depends on it
//!
//! ## Last Modified
//! v0.1.0 - Initial identifier types

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE as BASE64_URL, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

// ============================================
// Constants
// ============================================

/// Size of an enrollment challenge in bytes (256 bits).
pub const CHALLENGE_SIZE: usize = 32;

// ============================================
// Identifier Error Type
// ============================================

/// Error type for identifier and challenge parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Text is not a valid UUID
    InvalidUuid(String),
    /// Base64 decoding failed
    InvalidBase64(String),
    /// Decoded bytes have wrong length
    InvalidLength {
        /// Expected byte length
        expected: usize,
        /// Actual byte length
        actual: usize,
    },
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUuid(msg) => write!(f, "Invalid identifier: {msg}"),
            Self::InvalidBase64(msg) => write!(f, "Invalid base64: {msg}"),
            Self::InvalidLength { expected, actual } => {
                write!(f, "Invalid length: expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for IdError {}

// ============================================
// Record Identifiers
// ============================================

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random (v4) identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $label, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| IdError::InvalidUuid(e.to_string()))
            }
        }
    };
}

record_id!(
    /// Identifier of an enrolled (or pre-registered) device.
    ///
    /// # Example
    /// ```
    /// use aura_common::types::DeviceId;
    ///
    /// let id = DeviceId::generate();
    /// let parsed: DeviceId = id.to_string().parse().unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    DeviceId,
    "DeviceId"
);

record_id!(
    /// Identifier of an uploaded firmware artifact.
    FirmwareId,
    "FirmwareId"
);

record_id!(
    /// Identifier of a staged firmware release.
    ReleaseId,
    "ReleaseId"
);

// ============================================
// Challenge
// ============================================

/// Random enrollment challenge issued by Bootstrap and consumed by Provision.
///
/// # Security Properties
/// - 32 bytes from the thread-local CSPRNG (256 bits of entropy)
/// - Implements `Zeroize`, cleared on drop
/// - Does NOT implement `Copy`
///
/// # Wire Format
/// URL-safe base64 with padding (44 characters).
///
/// # Example
/// ```
/// use aura_common::types::Challenge;
///
/// let challenge = Challenge::generate();
/// let encoded = challenge.to_string();
/// assert_eq!(encoded.len(), 44);
///
/// let parsed: Challenge = encoded.parse().unwrap();
/// assert_eq!(challenge, parsed);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Zeroize)]
pub struct Challenge([u8; CHALLENGE_SIZE]);

impl Drop for Challenge {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Challenge {
    /// Creates a challenge from raw bytes.
    ///
    /// Returns `None` if `bytes` is not exactly 32 bytes long.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != CHALLENGE_SIZE {
            return None;
        }
        let mut value = [0u8; CHALLENGE_SIZE];
        value.copy_from_slice(bytes);
        Some(Self(value))
    }

    /// Generates a new cryptographically random challenge.
    #[must_use]
    pub fn generate() -> Self {
        let mut value = [0u8; CHALLENGE_SIZE];
        rand::thread_rng().fill_bytes(&mut value);
        Self(value)
    }

    /// Returns the raw challenge bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CHALLENGE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only show first 4 bytes; the full value is a bearer secret
        write!(
            f,
            "Challenge({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64_URL.encode(self.0))
    }
}

impl FromStr for Challenge {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64_URL
            .decode(s)
            .map_err(|e| IdError::InvalidBase64(e.to_string()))?;

        Self::from_bytes(&bytes).ok_or(IdError::InvalidLength {
            expected: CHALLENGE_SIZE,
            actual: bytes.len(),
        })
    }
}

impl Serialize for Challenge {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&BASE64_URL.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Challenge {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_generation() {
        let c1 = Challenge::generate();
        let c2 = Challenge::generate();

        assert_ne!(c1, c2);
        assert_eq!(c1.as_bytes().len(), CHALLENGE_SIZE);
    }

    #[test]
    fn test_challenge_is_url_safe() {
        for _ in 0..64 {
            let encoded = Challenge::generate().to_string();
            assert!(!encoded.contains('+'));
            assert!(!encoded.contains('/'));
            assert!(encoded.ends_with('='));
        }
    }

    #[test]
    fn test_challenge_rejects_wrong_length() {
        let short = BASE64_URL.encode([7u8; 16]);
        let err = short.parse::<Challenge>().unwrap_err();
        assert_eq!(err, IdError::InvalidLength { expected: 32, actual: 16 });

        assert!(matches!(
            "not base64!!".parse::<Challenge>(),
            Err(IdError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_challenge_debug_is_redacted() {
        let challenge = Challenge::from_bytes(&[0xab; CHALLENGE_SIZE]).unwrap();
        let debug = format!("{challenge:?}");
        assert_eq!(debug, "Challenge(abababab...)");
    }

    #[test]
    fn test_record_ids_are_distinct_types() {
        let uuid = Uuid::new_v4();
        let device = DeviceId::from_uuid(uuid);
        let release = ReleaseId::from_uuid(uuid);
        assert_eq!(device.to_string(), release.to_string());
        assert_eq!(device.as_uuid(), release.as_uuid());
    }

    #[test]
    fn test_record_id_parse_error() {
        let err = "device-123".parse::<DeviceId>().unwrap_err();
        assert!(err.to_string().contains("Invalid identifier"));
    }

    #[test]
    fn test_record_id_json_is_plain_string() {
        let id = FirmwareId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let restored: FirmwareId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
