// ============================================
// File: crates/aura-server/src/storage/blobs.rs
// ============================================
//! # Firmware Blob Store
//!
//! ## Creation Reason
//! Firmware images are large and immutable; they live outside the record
//! store and are addressed by firmware id.
//!
//! ## Main Functionality
//! - `FirmwareStore`: save/fetch/delete/exists by firmware id
//! - `LocalFirmwareStore`: one file per image at `{dir}/{id}.bin`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `save` writes to a temporary sibling and renames, so a crash never
//!   leaves a truncated image under the final name
//! - The returned size is the number of bytes written, which is what the
//!   registry checksums
//!
//! ## Last Modified
//! v0.1.0 - Initial blob store

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use aura_common::FirmwareId;

/// Result type for blob operations.
pub type BlobResult<T> = std::result::Result<T, BlobError>;

/// Blob store failures.
#[derive(Error, Debug)]
pub enum BlobError {
    /// No image stored under this id.
    #[error("firmware blob not found: {0}")]
    NotFound(FirmwareId),

    /// Filesystem failure.
    #[error("blob I/O failed ({context}): {source}")]
    Io {
        /// Operation that failed
        context: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl BlobError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for a missing image.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Where a saved image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Where the image was written.
    pub location: String,
    /// Bytes written.
    pub size: u64,
}

/// Firmware image persistence.
#[async_trait]
pub trait FirmwareStore: Send + Sync {
    /// Persists `data` under `id`, replacing any previous image.
    ///
    /// # Errors
    /// Returns `Io` if the image cannot be written.
    async fn save(&self, id: &FirmwareId, data: Bytes) -> BlobResult<StoredBlob>;

    /// # Errors
    /// Returns `NotFound` if no image is stored under `id`.
    async fn fetch(&self, id: &FirmwareId) -> BlobResult<Bytes>;

    /// Removes the image. Deleting a missing image succeeds.
    ///
    /// # Errors
    /// Returns `Io` if the file exists but cannot be removed.
    async fn delete(&self, id: &FirmwareId) -> BlobResult<()>;

    /// # Errors
    /// Returns `Io` if the store cannot be inspected.
    async fn exists(&self, id: &FirmwareId) -> BlobResult<bool>;
}

// ============================================
// LocalFirmwareStore
// ============================================

/// Filesystem-backed [`FirmwareStore`].
#[derive(Debug, Clone)]
pub struct LocalFirmwareStore {
    dir: PathBuf,
}

impl LocalFirmwareStore {
    /// Opens (creating if needed) the store rooted at `dir`.
    ///
    /// # Errors
    /// Returns `Io` if the directory cannot be created.
    pub async fn open(dir: impl AsRef<Path>) -> BlobResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BlobError::io(format!("create {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    /// Root directory of stored images.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &FirmwareId) -> PathBuf {
        self.dir.join(format!("{id}.bin"))
    }
}

#[async_trait]
impl FirmwareStore for LocalFirmwareStore {
    async fn save(&self, id: &FirmwareId, data: Bytes) -> BlobResult<StoredBlob> {
        let path = self.path_for(id);
        let staging = self.dir.join(format!(".{id}.bin.tmp"));

        tokio::fs::write(&staging, &data)
            .await
            .map_err(|e| BlobError::io(format!("write {}", staging.display()), e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| BlobError::io(format!("rename to {}", path.display()), e))?;

        debug!(firmware_id = %id, size = data.len(), "Stored firmware image");
        Ok(StoredBlob {
            location: path.display().to_string(),
            size: data.len() as u64,
        })
    }

    async fn fetch(&self, id: &FirmwareId) -> BlobResult<Bytes> {
        let path = self.path_for(id);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound(*id)),
            Err(e) => Err(BlobError::io(format!("read {}", path.display()), e)),
        }
    }

    async fn delete(&self, id: &FirmwareId) -> BlobResult<()> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::io(format!("remove {}", path.display()), e)),
        }
    }

    async fn exists(&self, id: &FirmwareId) -> BlobResult<bool> {
        tokio::fs::try_exists(self.path_for(id))
            .await
            .map_err(|e| BlobError::io("stat", e))
    }
}
