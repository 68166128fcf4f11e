// ============================================
// File: crates/aura-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the device-facing pub/sub protocol: payload types, their JSON
//! encoding and the per-device topic tree.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`messages`]: Device message structures
//! - [`codec`]: JSON serialization/deserialization
//! - [`topics`]: Topic construction, parsing and filter matching
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Rollout Phase                         │
//! │                                                             │
//! │  Platform ──── UpdateCommand ─────────────────────► Device  │
//! │  Platform ◄─── UpdateStatus (progress / outcome) ── Device  │
//! │  Platform ──── RollbackDirective (on failure) ────► Device  │
//! │                                                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     Steady State                            │
//! │                                                             │
//! │  Platform ◄─── DeviceTelemetry (periodic) ───────── Device  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Adding a field is safe; renaming one breaks deployed devices
//! - All messages are published with QoS 1 (at least once); handlers
//!   must tolerate duplicates
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;
pub mod topics;

// Re-export primary types
pub use codec::{decode_message, encode_message, Codec, JsonCodec};
pub use messages::{
    DeviceTelemetry, RollbackDirective, UpdateCommand, UpdateOutcome, UpdateStatus, WireMessage,
    ROLLBACK_ACTION,
};
pub use topics::{topic_matches, TopicKind, TopicLayout, DEFAULT_TOPIC_PREFIX};
