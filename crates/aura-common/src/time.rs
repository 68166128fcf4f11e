// ============================================
// File: crates/aura-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Record timestamps and challenge expiries need the same notion of "now"
//! in UTC. This module keeps those conversions in one place.
//!
//! ## Main Functionality
//! - `Timestamp`: UTC wall-clock instant used on records and on the wire
//! - `Expiry`: a deadline with an inclusive validity window
//!
//! ## ⚠️ Important Note for Next Developer
//! - Expiry uses wall-clock time because `expires_at` is returned to
//!   devices; do not swap it for `Instant`
//! - A value is still valid AT its deadline and expired strictly after
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// UTC timestamp used on records and in RPC payloads.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

// ============================================
// Expiry
// ============================================

/// A wall-clock deadline.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use aura_common::time::Expiry;
///
/// let expiry = Expiry::after(Duration::from_secs(300));
/// assert!(!expiry.is_expired());
/// assert!(expiry.remaining().as_secs() <= 300);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expiry(Timestamp);

impl Expiry {
    /// Creates an expiry `ttl` from now.
    ///
    /// A TTL too large to represent saturates at the maximum timestamp.
    #[must_use]
    pub fn after(ttl: Duration) -> Self {
        Self::after_from(now(), ttl)
    }

    /// Creates an expiry `ttl` after `start`.
    #[must_use]
    pub fn after_from(start: Timestamp, ttl: Duration) -> Self {
        let deadline = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| start.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self(deadline)
    }

    /// Returns the deadline.
    #[must_use]
    pub const fn deadline(&self) -> Timestamp {
        self.0
    }

    /// Returns `true` if `instant` is strictly past the deadline.
    #[must_use]
    pub fn is_expired_at(&self, instant: Timestamp) -> bool {
        instant > self.0
    }

    /// Returns `true` if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now())
    }

    /// Returns the time left before the deadline (zero once expired).
    #[must_use]
    pub fn remaining(&self) -> Duration {
        (self.0 - now()).to_std().unwrap_or(Duration::ZERO)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let start = now();
        let expiry = Expiry::after_from(start, Duration::from_secs(300));

        assert!(!expiry.is_expired_at(start));
        assert!(!expiry.is_expired_at(expiry.deadline()));
        assert!(expiry.is_expired_at(expiry.deadline() + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_expiry_in_the_past() {
        let expiry = Expiry::after_from(now() - chrono::Duration::seconds(10), Duration::from_secs(1));
        assert!(expiry.is_expired());
        assert_eq!(expiry.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_expiry_saturates() {
        let expiry = Expiry::after(Duration::from_secs(u64::MAX));
        assert_eq!(expiry.deadline(), DateTime::<Utc>::MAX_UTC);
    }
}
