// ============================================
// File: crates/aura-server/src/services/firmware.rs
// ============================================
//! # Firmware Registry
//!
//! ## Creation Reason
//! Registers uploaded firmware images: the blob goes to the firmware store,
//! the metadata (with the checksum devices verify against) to the record
//! store.
//!
//! ## Main Functionality
//! - `FirmwareRegistry::upload`: store bytes, checksum, record
//! - `FirmwareRegistry::verify`: re-hash the stored bytes
//! - `FirmwareRegistry::download`: fetch the stored bytes
//!
//! ## ⚠️ Important Note for Next Developer
//! - The checksum is computed over the bytes handed to the store, which are
//!   the bytes that get persisted
//! - If the record cannot be created the blob is deleted again
//!
//! ## Last Modified
//! v0.1.0 - Initial firmware registry

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use aura_common::error::CommonError;
use aura_common::FirmwareId;
use aura_core::crypto::sha256_hex;

use crate::error::Result;
use crate::storage::{Firmware, FirmwareStore, NewFirmware, RecordStore, StoreError};

/// Firmware upload and lookup.
#[derive(Clone)]
pub struct FirmwareRegistry {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn FirmwareStore>,
}

impl FirmwareRegistry {
    /// Creates a registry over the record and blob stores.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn FirmwareStore>) -> Self {
        Self { records, blobs }
    }

    /// Stores a new firmware image and records its metadata.
    ///
    /// # Errors
    /// - `Common(InvalidInput)` for an empty version or image
    /// - `Store(Conflict)` if the version already exists
    /// - `Blob` if the image cannot be stored
    pub async fn upload(
        &self,
        version: &str,
        description: &str,
        data: impl Into<Bytes>,
    ) -> Result<Firmware> {
        let data = data.into();
        let version = version.trim();
        if version.is_empty() {
            return Err(CommonError::invalid_input("version", "must not be empty").into());
        }
        if data.is_empty() {
            return Err(CommonError::invalid_input("data", "firmware image is empty").into());
        }

        // Cheap early reject; create_firmware enforces uniqueness atomically
        match self.records.firmware_by_version(version).await {
            Ok(existing) => {
                return Err(StoreError::Conflict {
                    entity: "firmware version",
                    key: existing.version,
                }
                .into());
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let id = FirmwareId::generate();
        let checksum = sha256_hex(&data);
        let stored = self.blobs.save(&id, data).await?;

        let record = self
            .records
            .create_firmware(NewFirmware {
                id,
                version: version.to_string(),
                description: description.to_string(),
                location: stored.location,
                size: stored.size,
                checksum,
            })
            .await;

        match record {
            Ok(firmware) => {
                info!(
                    firmware_id = %firmware.id,
                    version = %firmware.version,
                    size = firmware.size,
                    "Firmware registered"
                );
                Ok(firmware)
            }
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&id).await {
                    warn!(firmware_id = %id, error = %cleanup, "Failed to remove orphaned firmware blob");
                }
                Err(e.into())
            }
        }
    }

    /// Returns `true` if the stored bytes still hash to the recorded
    /// checksum.
    ///
    /// # Errors
    /// Returns error if the record or blob is missing.
    pub async fn verify(&self, id: &FirmwareId) -> Result<bool> {
        let firmware = self.records.get_firmware(id).await?;
        let data = self.blobs.fetch(id).await?;
        Ok(sha256_hex(&data) == firmware.checksum)
    }

    /// Returns the firmware record and its image.
    ///
    /// # Errors
    /// Returns error if the record or blob is missing.
    pub async fn download(&self, id: &FirmwareId) -> Result<(Firmware, Bytes)> {
        let firmware = self.records.get_firmware(id).await?;
        let data = self.blobs.fetch(id).await?;
        Ok((firmware, data))
    }
}

impl std::fmt::Debug for FirmwareRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirmwareRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::storage::{LocalFirmwareStore, MemoryRecordStore};
    use sha2::{Digest, Sha256};

    async fn registry(dir: &std::path::Path) -> (Arc<MemoryRecordStore>, FirmwareRegistry) {
        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(LocalFirmwareStore::open(dir).await.unwrap());
        (records.clone(), FirmwareRegistry::new(records, blobs))
    }

    #[tokio::test]
    async fn test_checksum_matches_stored_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (_, registry) = registry(dir.path()).await;

        let fw = registry.upload("1.2.0", "stable", &b"0123456789"[..]).await.unwrap();
        assert_eq!(fw.size, 10);

        let on_disk = std::fs::read(&fw.location).unwrap();
        assert_eq!(fw.checksum, hex::encode(Sha256::digest(&on_disk)));
        assert!(registry.verify(&fw.id).await.unwrap());

        let (_, data) = registry.download(&fw.id).await.unwrap();
        assert_eq!(&data[..], b"0123456789");
    }

    #[tokio::test]
    async fn test_duplicate_version_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let (records, registry) = registry(dir.path()).await;

        let first = registry.upload("1.0.0", "", &b"first"[..]).await.unwrap();
        let err = registry.upload("1.0.0", "", &b"second"[..]).await.unwrap_err();
        assert!(matches!(err, ServerError::Store(StoreError::Conflict { .. })));

        assert_eq!(records.list_firmware().await.unwrap(), vec![first.clone()]);
        assert_eq!(std::fs::read(&first.location).unwrap(), b"first");
        // Only the first image is on disk
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let (_, registry) = registry(dir.path()).await;

        assert!(registry.upload("", "", &b"x"[..]).await.is_err());
        assert!(registry.upload("1.0.0", "", Bytes::new()).await.is_err());
    }
}
