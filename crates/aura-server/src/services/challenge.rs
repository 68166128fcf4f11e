// ============================================
// File: crates/aura-server/src/services/challenge.rs
// ============================================
//! # Challenge Store
//!
//! ## Creation Reason
//! Bootstrap hands out a random challenge that Provision must present
//! exactly once before it expires. This module holds the outstanding ones.
//!
//! ## Main Functionality
//! - `ChallengeStore::issue`: record a fresh challenge for a bootstrap token
//! - `ChallengeStore::consume`: single-use redemption with expiry check
//! - `ChallengeStore::sweep_expired`: background cleanup
//!
//! ## Challenge Lifecycle
//! ```text
//! issue ──▶ outstanding ──consume (in time)──▶ removed, token returned
//!                │
//!                ├──consume (late)──▶ removed, Expired
//!                └──sweep (late)────▶ removed
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every operation is one critical section on one mutex; that is what
//!   makes redemption single-use under concurrent Provision calls
//! - State is process-local: a restart forgets every outstanding challenge
//!
//! ## Last Modified
//! v0.1.0 - Initial challenge store

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use aura_common::time::{now, Expiry, Timestamp};
use aura_common::Challenge;

/// Why a challenge could not be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeError {
    /// Never issued, or already redeemed or swept.
    Unknown,
    /// Issued but past its deadline; it has now been discarded.
    Expired,
}

#[derive(Debug)]
struct Pending {
    expiry: Expiry,
    bootstrap_token: String,
}

/// Outstanding Bootstrap challenges.
#[derive(Debug)]
pub struct ChallengeStore {
    ttl: Duration,
    pending: Mutex<HashMap<Challenge, Pending>>,
}

impl ChallengeStore {
    /// Creates an empty store whose challenges live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Lifetime of issued challenges.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a challenge for `bootstrap_token`, expiring `ttl` from now.
    pub fn issue(&self, bootstrap_token: &str) -> (Challenge, Expiry) {
        self.issue_at(bootstrap_token, now())
    }

    /// Issues a challenge as of `issued_at`.
    pub fn issue_at(&self, bootstrap_token: &str, issued_at: Timestamp) -> (Challenge, Expiry) {
        let expiry = Expiry::after_from(issued_at, self.ttl);
        let mut pending = self.pending.lock();

        let mut challenge = Challenge::generate();
        while pending.contains_key(&challenge) {
            challenge = Challenge::generate();
        }

        pending.insert(
            challenge.clone(),
            Pending {
                expiry,
                bootstrap_token: bootstrap_token.to_string(),
            },
        );
        (challenge, expiry)
    }

    /// Redeems `challenge` as of `at`, returning the bootstrap token it was
    /// issued for.
    ///
    /// The challenge is removed whether or not it has expired.
    ///
    /// # Errors
    /// `Unknown` if it is not outstanding, `Expired` if it was past its
    /// deadline.
    pub fn consume(&self, challenge: &Challenge, at: Timestamp) -> Result<String, ConsumeError> {
        let entry = self
            .pending
            .lock()
            .remove(challenge)
            .ok_or(ConsumeError::Unknown)?;

        if entry.expiry.is_expired_at(at) {
            return Err(ConsumeError::Expired);
        }
        Ok(entry.bootstrap_token)
    }

    /// Removes every challenge expired as of `at`; returns how many.
    pub fn sweep_expired(&self, at: Timestamp) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, p| !p.expiry.is_expired_at(at));
        let removed = before - pending.len();

        if removed > 0 {
            debug!(removed, remaining = pending.len(), "Swept expired challenges");
        }
        removed
    }

    /// Number of outstanding challenges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if no challenge is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(300);

    #[test]
    fn test_consume_once() {
        let store = ChallengeStore::new(TTL);
        let (challenge, _) = store.issue("tok");

        assert_eq!(store.consume(&challenge, now()), Ok("tok".to_string()));
        assert_eq!(store.consume(&challenge, now()), Err(ConsumeError::Unknown));
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_is_discarded() {
        let store = ChallengeStore::new(TTL);
        let start = now();
        let (challenge, expiry) = store.issue_at("tok", start);

        let late = expiry.deadline() + chrono::Duration::seconds(1);
        assert_eq!(store.consume(&challenge, late), Err(ConsumeError::Expired));
        assert_eq!(store.consume(&challenge, start), Err(ConsumeError::Unknown));
    }

    #[test]
    fn test_deadline_itself_is_valid() {
        let store = ChallengeStore::new(TTL);
        let (challenge, expiry) = store.issue("tok");
        assert!(store.consume(&challenge, expiry.deadline()).is_ok());
    }

    #[test]
    fn test_unknown_challenge() {
        let store = ChallengeStore::new(TTL);
        assert_eq!(store.consume(&Challenge::generate(), now()), Err(ConsumeError::Unknown));
    }

    #[test]
    fn test_sweep() {
        let store = ChallengeStore::new(TTL);
        let start = now();
        store.issue_at("old", start - chrono::Duration::seconds(600));
        let (fresh, _) = store.issue_at("new", start);

        assert_eq!(store.sweep_expired(start), 1);
        assert_eq!(store.len(), 1);
        assert!(store.consume(&fresh, start).is_ok());
    }

    #[test]
    fn test_concurrent_consume_single_winner() {
        let store = Arc::new(ChallengeStore::new(TTL));
        let (challenge, _) = store.issue("tok");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let challenge = challenge.clone();
                std::thread::spawn(move || store.consume(&challenge, now()).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
