// ============================================
// File: crates/aura-server/src/handlers/mod.rs
// ============================================
//! # Request Handlers
//!
//! ## Creation Reason
//! Network-facing entry points, kept apart from the services they call.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`rpc`]: Provisioning RPC over HTTP/JSON
//!
//! ## Data Flow
//! ```text
//! Device ──HTTP/JSON──▶ rpc::router ──▶ ProvisioningService
//!                            │
//!        ◀── {code,message} ─┘ (ProvisioningError → status)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers translate and delegate; no business rules live here
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod rpc;

pub use rpc::{router, serve, SERVICE_PATH};
