// ============================================
// File: crates/aura-transport/src/lib.rs
// ============================================
//! # Aura Transport - Device Messaging Layer
//!
//! ## Creation Reason
//! Provides the publish/subscribe transport between the platform and the
//! device fleet: a reconnecting MQTT session, an in-memory stand-in for
//! tests, and a typed fleet client on top of either.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `PubSub` trait and MQTT configuration
//! - [`mqtt`]: rumqttc-backed reconnecting client
//! - [`mock`]: in-memory broker for tests
//! - [`fleet`]: typed device commands and subscriptions
//! - [`registry`]: filter → handler dispatch
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 aura-server                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │     aura-core          aura-transport              │
//! │                        You are here ◄──            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │               aura-common                          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Device Fleet                            │
//! │                       ▲                                  │
//! │                       │                                  │
//! │            ┌──────────┴──────────┐                      │
//! │            │    MQTT Broker      │                      │
//! │            └──────────┬──────────┘                      │
//! │                       │                                  │
//! │            ┌──────────┴──────────┐                      │
//! │            │     MqttPubSub      │                      │
//! │            │ (reconnect, qos 1)  │                      │
//! │            └──────────┬──────────┘                      │
//! │                       │                                  │
//! │            ┌──────────┴──────────┐                      │
//! │            │    FleetClient      │                      │
//! │            │  (topics + JSON)    │                      │
//! │            └──────────┬──────────┘                      │
//! │                       │                                  │
//! │                       ▼                                  │
//! │               Release Orchestrator                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always depend on `PubSub`, not `MqttPubSub`, for testability
//! - Handlers run on the event-loop task; keep them short
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod fleet;
pub mod mock;
pub mod mqtt;
pub mod registry;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use fleet::FleetClient;
pub use mock::{MemoryBroker, PublishedMessage};
pub use mqtt::MqttPubSub;
pub use traits::{MessageHandler, MqttConfig, PubSub};
