// ============================================
// File: crates/aura-transport/src/registry.rs
// ============================================
//! # Subscription Registry
//!
//! ## Creation Reason
//! Both the MQTT client and the in-memory broker need to remember which
//! handlers are interested in which topic filters and fan inbound messages
//! out to them.
//!
//! ## Main Functionality
//! - `SubscriptionRegistry`: filter → handlers map with wildcard dispatch
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers are cloned out of the map before being invoked so a handler
//!   may itself subscribe without deadlocking on a shard lock
//!
//! ## Last Modified
//! v0.1.0 - Initial registry

use dashmap::DashMap;

use aura_core::protocol::topic_matches;

use crate::traits::MessageHandler;

/// Concurrent map from topic filter to the handlers registered for it.
#[derive(Default)]
pub struct SubscriptionRegistry {
    filters: DashMap<String, Vec<MessageHandler>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` under `filter`.
    ///
    /// Returns `true` if this is the first handler for the filter.
    pub fn register(&self, filter: &str, handler: MessageHandler) -> bool {
        let mut entry = self.filters.entry(filter.to_string()).or_default();
        entry.push(handler);
        entry.len() == 1
    }

    /// Returns every registered filter.
    #[must_use]
    pub fn filters(&self) -> Vec<String> {
        self.filters.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of distinct filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Invokes every handler whose filter matches `topic`.
    ///
    /// Returns the number of handlers called.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        let matched: Vec<MessageHandler> = self
            .filters
            .iter()
            .filter(|e| topic_matches(e.key(), topic))
            .flat_map(|e| e.value().clone())
            .collect();

        for handler in &matched {
            handler(topic, payload);
        }
        matched.len()
    }

    /// Removes all registrations.
    pub fn clear(&self) {
        self.filters.clear();
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("filters", &self.filters())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, MessageHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_dispatch_by_filter() {
        let registry = SubscriptionRegistry::new();
        let (telemetry, h1) = counter();
        let (everything, h2) = counter();

        assert!(registry.register("aura/devices/+/telemetry", h1));
        assert!(registry.register("aura/#", h2));

        assert_eq!(registry.dispatch("aura/devices/a/telemetry", b"{}"), 2);
        assert_eq!(registry.dispatch("aura/devices/a/update/status", b"{}"), 1);
        assert_eq!(registry.dispatch("other/topic", b"{}"), 0);

        assert_eq!(telemetry.load(Ordering::SeqCst), 1);
        assert_eq!(everything.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_multiple_handlers_per_filter() {
        let registry = SubscriptionRegistry::new();
        let (a, h1) = counter();
        let (b, h2) = counter();

        assert!(registry.register("t", h1));
        assert!(!registry.register("t", h2));
        assert_eq!(registry.len(), 1);

        registry.dispatch("t", b"");
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);

        registry.clear();
        assert!(registry.is_empty());
    }
}
