// ============================================
// File: crates/aura-common/src/lib.rs
// ============================================
//! # Aura Common
//!
//! ## Creation Reason
//! Identifiers and clocks are shared by the records, the wire messages and
//! the RPC payloads. Defining them once keeps a `DeviceId` in a topic, a
//! record and a certificate subject the same value.
//!
//! ## Main Functionality
//! - [`types`]: `DeviceId`, `FirmwareId`, `ReleaseId` and the enrollment `Challenge`
//! - [`time`]: UTC timestamps and inclusive expiries
//! - [`error`]: `CommonError`, wrapped by every other crate's error
//!
//! ## Crate Graph
//! ```text
//!   aura-server ──▶ aura-transport ──▶ aura-core ──▶ aura-common
//!        │                                 ▲             ▲
//!        └─────────────────────────────────┴─────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - No internal dependencies; this is the leaf of the graph
//! - `Challenge` zeroizes on drop and never prints its value in `Debug`
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

pub use error::{CommonError, Result};
pub use time::{Expiry, Timestamp};
pub use types::{Challenge, DeviceId, FirmwareId, IdError, ReleaseId};
