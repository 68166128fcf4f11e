// ============================================
// File: crates/aura-server/src/storage/mod.rs
// ============================================
//! # Storage Collaborators
//!
//! ## Main Functionality
//! - `records`: device, firmware and release records
//! - `blobs`: firmware images
//! - `models`: the record types
//!
//! ## Last Modified
//! v0.1.0 - Initial storage layer

pub mod blobs;
pub mod models;
pub mod records;

pub use blobs::{BlobError, FirmwareStore, LocalFirmwareStore, StoredBlob};
pub use models::{
    Device, Firmware, NewFirmware, NewRelease, Release, ReleaseStage, ReleaseStatus,
};
pub use records::{MemoryRecordStore, RecordStore, StoreError};
