// ============================================
// File: crates/aura-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Request-level business logic for the server, separated from the RPC
//! surface and from storage.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`challenge`]: Outstanding enrollment challenges
//! - [`provisioning`]: Bootstrap/Provision handling
//! - [`firmware`]: Firmware registration and lookup
//!
//! ## Service Interactions
//! ```text
//! ProvisioningService ──▶ ChallengeStore
//!         │
//!         ├──▶ CertificateAuthority
//!         └──▶ RecordStore ◀── FirmwareRegistry ──▶ FirmwareStore
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Services take their collaborators as `Arc<dyn Trait>` so tests can use
//!   the in-memory stores
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod challenge;
pub mod firmware;
pub mod provisioning;

pub use challenge::{ChallengeStore, ConsumeError};
pub use firmware::FirmwareRegistry;
pub use provisioning::{
    BootstrapRequest, BootstrapResponse, ProvisionRequest, ProvisionResponse,
    ProvisioningService, ProvisioningSettings,
};
