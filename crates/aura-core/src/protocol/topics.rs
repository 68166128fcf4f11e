// ============================================
// File: crates/aura-core/src/protocol/topics.rs
// ============================================
//! # Topic Layout
//!
//! ## Creation Reason
//! Every device has four topics under a shared platform prefix. Building
//! and parsing them in one place keeps the orchestrator, the transport and
//! the tests in agreement.
//!
//! ## Topic Tree
//! ```text
//! {prefix}/devices/{device_id}/telemetry          device → platform
//! {prefix}/devices/{device_id}/update/command     platform → device
//! {prefix}/devices/{device_id}/update/status      device → platform
//! {prefix}/devices/{device_id}/update/rollback    platform → device
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `topic_matches` implements MQTT filter semantics (`+` one level,
//!   `#` remaining levels); the broker does the same, so keep them in sync
//!
//! ## Last Modified
//! v0.1.0 - Initial topic layout

use aura_common::DeviceId;

use crate::error::{CoreError, Result};

/// Default topic namespace.
pub const DEFAULT_TOPIC_PREFIX: &str = "aura";

/// Which per-device topic a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// `.../telemetry`
    Telemetry,
    /// `.../update/command`
    UpdateCommand,
    /// `.../update/status`
    UpdateStatus,
    /// `.../update/rollback`
    Rollback,
}

impl TopicKind {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Telemetry => "telemetry",
            Self::UpdateCommand => "update/command",
            Self::UpdateStatus => "update/status",
            Self::Rollback => "update/rollback",
        }
    }
}

/// Builds and parses device topics under a prefix.
///
/// # Example
/// ```
/// use aura_common::DeviceId;
/// use aura_core::protocol::topics::{TopicKind, TopicLayout};
///
/// let layout = TopicLayout::default();
/// let id = DeviceId::generate();
/// let topic = layout.topic(TopicKind::UpdateCommand, &id);
/// assert_eq!(topic, format!("aura/devices/{id}/update/command"));
/// assert_eq!(layout.parse(&topic).unwrap(), (id, TopicKind::UpdateCommand));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicLayout {
    prefix: String,
}

impl TopicLayout {
    /// Creates a layout under `prefix` (trailing slashes are ignored).
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Topic of `kind` for one device.
    #[must_use]
    pub fn topic(&self, kind: TopicKind, device_id: &DeviceId) -> String {
        format!("{}/devices/{}/{}", self.prefix, device_id, kind.suffix())
    }

    /// Wildcard filter matching `kind` for every device.
    #[must_use]
    pub fn wildcard(&self, kind: TopicKind) -> String {
        format!("{}/devices/+/{}", self.prefix, kind.suffix())
    }

    /// Splits a concrete topic into its device id and kind.
    ///
    /// # Errors
    /// Returns `UnrecognizedTopic` if the topic is outside this layout or the
    /// device segment is not a valid id.
    pub fn parse(&self, topic: &str) -> Result<(DeviceId, TopicKind)> {
        let unrecognized = || CoreError::UnrecognizedTopic {
            topic: topic.to_string(),
        };

        let rest = topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|r| r.strip_prefix("/devices/"))
            .ok_or_else(unrecognized)?;
        let (device, suffix) = rest.split_once('/').ok_or_else(unrecognized)?;

        let kind = [
            TopicKind::Telemetry,
            TopicKind::UpdateCommand,
            TopicKind::UpdateStatus,
            TopicKind::Rollback,
        ]
        .into_iter()
        .find(|k| k.suffix() == suffix)
        .ok_or_else(unrecognized)?;

        let device_id = device.parse().map_err(|_| unrecognized())?;
        Ok((device_id, kind))
    }
}

impl Default for TopicLayout {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}

/// Returns `true` if `topic` matches the MQTT subscription `filter`.
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    // Wildcards never match system topics at the first level
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

// ============================================
// Tests
// ============================================
