// ============================================
// File: crates/aura-server/src/storage/records.rs
// ============================================
//! # Record Store
//!
//! ## Creation Reason
//! Provisioning and orchestration read and write device, firmware and
//! release records through one narrow interface so the backing database can
//! be swapped without touching either.
//!
//! ## Main Functionality
//! - `RecordStore`: async CRUD interface with unique-key and foreign-key
//!   guarantees
//! - `MemoryRecordStore`: in-process implementation used by the server
//!   binary and the tests
//! - `StoreError`: distinguishable not-found/conflict conditions
//!
//! ## Constraints
//! ```text
//! devices.bootstrap_token   unique (while set)
//! firmware.version          unique
//! releases.firmware_id   →  firmware.id
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `mark_device_provisioned` is the only way to provision a device and is
//!   atomic: check-and-set under one write lock
//! - Never hold the lock across an `.await`
//!
//! ## Last Modified
//! v0.1.0 - Initial record store

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use aura_common::time::now;
use aura_common::{DeviceId, FirmwareId, ReleaseId};

use super::models::{
    Device, Firmware, NewFirmware, NewRelease, Release, ReleaseStage, ReleaseStatus,
};

// ============================================
// StoreError
// ============================================

/// Result type for record store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Record store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this key.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Record kind
        entity: &'static str,
        /// Lookup key
        key: String,
    },

    /// A unique key is already taken.
    #[error("{entity} already exists: {key}")]
    Conflict {
        /// Record kind
        entity: &'static str,
        /// Conflicting key
        key: String,
    },

    /// A referenced record does not exist.
    #[error("{entity} references missing {key}")]
    ForeignKey {
        /// Record kind being written
        entity: &'static str,
        /// Missing reference
        key: String,
    },

    /// The device already completed Provision.
    #[error("device {0} is already provisioned")]
    AlreadyProvisioned(DeviceId),

    /// Backend unreachable.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    fn conflict(entity: &'static str, key: impl ToString) -> Self {
        Self::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns `true` for a missing record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for a unique-key violation.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if retrying later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

// ============================================
// RecordStore Trait
// ============================================

/// Device, firmware and release persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Pre-registers a device with its bootstrap token.
    ///
    /// # Errors
    /// `Conflict` if the token is already assigned.
    async fn create_device(&self, bootstrap_token: &str) -> StoreResult<Device>;

    /// # Errors
    /// `NotFound` if no device has this id.
    async fn get_device(&self, id: &DeviceId) -> StoreResult<Device>;

    /// Lists devices in registration order.
    ///
    /// # Errors
    /// `Unavailable` if the backend cannot be read.
    async fn list_devices(&self) -> StoreResult<Vec<Device>>;

    /// Returns `true` if an unprovisioned device holds this token.
    ///
    /// # Errors
    /// `Unavailable` if the backend cannot be read.
    async fn bootstrap_token_exists(&self, token: &str) -> StoreResult<bool>;

    /// Returns the unprovisioned device holding this token.
    ///
    /// # Errors
    /// `NotFound` if no unprovisioned device holds it.
    async fn device_for_bootstrap_token(&self, token: &str) -> StoreResult<Device>;

    /// Marks a device provisioned, records its certificate serial and clears
    /// its bootstrap token.
    ///
    /// # Errors
    /// `NotFound` for an unknown device, `AlreadyProvisioned` if it was
    /// provisioned before.
    async fn mark_device_provisioned(&self, id: &DeviceId, serial: &str) -> StoreResult<Device>;

    /// # Errors
    /// `Conflict` if the version already exists.
    async fn create_firmware(&self, new: NewFirmware) -> StoreResult<Firmware>;

    /// # Errors
    /// `NotFound` if no firmware has this id.
    async fn get_firmware(&self, id: &FirmwareId) -> StoreResult<Firmware>;

    /// # Errors
    /// `NotFound` if no firmware has this version.
    async fn firmware_by_version(&self, version: &str) -> StoreResult<Firmware>;

    /// # Errors
    /// `Unavailable` if the backend cannot be read.
    async fn list_firmware(&self) -> StoreResult<Vec<Firmware>>;

    /// Creates a `pending`/`canary` release.
    ///
    /// # Errors
    /// `ForeignKey` if the firmware does not exist.
    async fn create_release(&self, new: NewRelease) -> StoreResult<Release>;

    /// # Errors
    /// `NotFound` if no release has this id.
    async fn get_release(&self, id: &ReleaseId) -> StoreResult<Release>;

    /// Lists releases in creation order.
    ///
    /// # Errors
    /// `Unavailable` if the backend cannot be read.
    async fn list_releases(&self) -> StoreResult<Vec<Release>>;

    /// Overwrites status and stage in one write.
    ///
    /// # Errors
    /// `NotFound` if no release has this id.
    async fn update_release_state(
        &self,
        id: &ReleaseId,
        status: ReleaseStatus,
        stage: ReleaseStage,
    ) -> StoreResult<Release>;
}

// ============================================
// MemoryRecordStore
// ============================================

#[derive(Debug, Default)]
struct Tables {
    devices: Vec<Device>,
    firmware: Vec<Firmware>,
    releases: Vec<Release>,
}

/// In-memory [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn token_matches(device: &Device, token: &str) -> bool {
    !device.is_provisioned() && device.bootstrap_token.as_deref() == Some(token)
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_device(&self, bootstrap_token: &str) -> StoreResult<Device> {
        let mut tables = self.tables.write();
        if tables
            .devices
            .iter()
            .any(|d| d.bootstrap_token.as_deref() == Some(bootstrap_token))
        {
            return Err(StoreError::conflict("device bootstrap token", "<redacted>"));
        }

        let timestamp = now();
        let device = Device {
            id: DeviceId::generate(),
            bootstrap_token: Some(bootstrap_token.to_string()),
            claimed_by: None,
            claimed_at: None,
            provisioned_at: None,
            certificate_serial: None,
            created_at: timestamp,
            updated_at: timestamp,
        };
        tables.devices.push(device.clone());
        Ok(device)
    }

    async fn get_device(&self, id: &DeviceId) -> StoreResult<Device> {
        self.tables
            .read()
            .devices
            .iter()
            .find(|d| d.id == *id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("device", id))
    }

    async fn list_devices(&self) -> StoreResult<Vec<Device>> {
        Ok(self.tables.read().devices.clone())
    }

    async fn bootstrap_token_exists(&self, token: &str) -> StoreResult<bool> {
        Ok(self.tables.read().devices.iter().any(|d| token_matches(d, token)))
    }

    async fn device_for_bootstrap_token(&self, token: &str) -> StoreResult<Device> {
        self.tables
            .read()
            .devices
            .iter()
            .find(|d| token_matches(d, token))
            .cloned()
            .ok_or_else(|| StoreError::not_found("device", "<bootstrap token>"))
    }

    async fn mark_device_provisioned(&self, id: &DeviceId, serial: &str) -> StoreResult<Device> {
        let mut tables = self.tables.write();
        let device = tables
            .devices
            .iter_mut()
            .find(|d| d.id == *id)
            .ok_or_else(|| StoreError::not_found("device", id))?;

        if device.is_provisioned() {
            return Err(StoreError::AlreadyProvisioned(*id));
        }

        let timestamp = now();
        device.provisioned_at = Some(timestamp);
        device.certificate_serial = Some(serial.to_string());
        device.bootstrap_token = None;
        device.updated_at = timestamp;
        Ok(device.clone())
    }

    async fn create_firmware(&self, new: NewFirmware) -> StoreResult<Firmware> {
        let mut tables = self.tables.write();
        if tables.firmware.iter().any(|f| f.version == new.version) {
            return Err(StoreError::conflict("firmware version", &new.version));
        }
        if tables.firmware.iter().any(|f| f.id == new.id) {
            return Err(StoreError::conflict("firmware", new.id));
        }

        let timestamp = now();
        let firmware = Firmware {
            id: new.id,
            version: new.version,
            description: new.description,
            location: new.location,
            size: new.size,
            checksum: new.checksum,
            created_at: timestamp,
            updated_at: timestamp,
        };
        tables.firmware.push(firmware.clone());
        Ok(firmware)
    }

    async fn get_firmware(&self, id: &FirmwareId) -> StoreResult<Firmware> {
        self.tables
            .read()
            .firmware
            .iter()
            .find(|f| f.id == *id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("firmware", id))
    }

    async fn firmware_by_version(&self, version: &str) -> StoreResult<Firmware> {
        self.tables
            .read()
            .firmware
            .iter()
            .find(|f| f.version == version)
            .cloned()
            .ok_or_else(|| StoreError::not_found("firmware version", version))
    }

    async fn list_firmware(&self) -> StoreResult<Vec<Firmware>> {
        Ok(self.tables.read().firmware.clone())
    }

    async fn create_release(&self, new: NewRelease) -> StoreResult<Release> {
        let mut tables = self.tables.write();
        if !tables.firmware.iter().any(|f| f.id == new.firmware_id) {
            return Err(StoreError::ForeignKey {
                entity: "release",
                key: format!("firmware {}", new.firmware_id),
            });
        }

        let timestamp = now();
        let release = Release {
            id: ReleaseId::generate(),
            firmware_id: new.firmware_id,
            status: ReleaseStatus::Pending,
            stage: ReleaseStage::Canary,
            target_selector: new.target_selector,
            health_policy: new.health_policy,
            created_at: timestamp,
            updated_at: timestamp,
        };
        tables.releases.push(release.clone());
        Ok(release)
    }

    async fn get_release(&self, id: &ReleaseId) -> StoreResult<Release> {
        self.tables
            .read()
            .releases
            .iter()
            .find(|r| r.id == *id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("release", id))
    }

    async fn list_releases(&self) -> StoreResult<Vec<Release>> {
        Ok(self.tables.read().releases.clone())
    }

    async fn update_release_state(
        &self,
        id: &ReleaseId,
        status: ReleaseStatus,
        stage: ReleaseStage,
    ) -> StoreResult<Release> {
        let mut tables = self.tables.write();
        let release = tables
            .releases
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or_else(|| StoreError::not_found("release", id))?;

        release.status = status;
        release.stage = stage;
        release.updated_at = now();
        Ok(release.clone())
    }
}

// ============================================
// Tests
// ============================================
