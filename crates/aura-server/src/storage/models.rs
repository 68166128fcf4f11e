// ============================================
// File: crates/aura-server/src/storage/models.rs
// ============================================
//! # Record Models
//!
//! ## Creation Reason
//! Plain data types for the device, firmware and release records the
//! provisioning service and orchestrator read and write.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ReleaseStatus`/`ReleaseStage` serialize as snake_case strings; they
//!   are the persisted form of the orchestrator state machine
//! - A device's `provisioned_at` is set once and never cleared
//!
//! ## Last Modified
//! v0.1.0 - Initial record models

use std::fmt;

use serde::{Deserialize, Serialize};

use aura_common::time::Timestamp;
use aura_common::{DeviceId, FirmwareId, ReleaseId};

// ============================================
// Device
// ============================================

/// An enrolled or enrollable device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device identity; also the certificate CN.
    pub id: DeviceId,
    /// Single-use enrollment secret; cleared by a successful Provision.
    pub bootstrap_token: Option<String>,
    /// Bootstrap token that claimed the device.
    pub claimed_by: Option<String>,
    /// When Bootstrap claimed the device.
    pub claimed_at: Option<Timestamp>,
    /// When Provision completed.
    pub provisioned_at: Option<Timestamp>,
    /// Hex serial of the issued client certificate.
    pub certificate_serial: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl Device {
    /// Returns `true` once Provision has completed for this device.
    #[must_use]
    pub const fn is_provisioned(&self) -> bool {
        self.provisioned_at.is_some()
    }
}

// ============================================
// Firmware
// ============================================

/// An uploaded firmware image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firmware {
    /// Firmware identity; also the blob key.
    pub id: FirmwareId,
    /// Operator-supplied version string.
    pub version: String,
    /// Free-form notes.
    pub description: String,
    /// Where the blob store put the image.
    pub location: String,
    /// Image size in bytes.
    pub size: u64,
    /// Lower-case hex SHA-256 of the stored bytes.
    pub checksum: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

/// Fields supplied when recording a firmware upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFirmware {
    /// Firmware identity; also the blob key.
    pub id: FirmwareId,
    /// Operator-supplied version string.
    pub version: String,
    /// Free-form notes.
    pub description: String,
    /// Where the blob store put the image.
    pub location: String,
    /// Image size in bytes.
    pub size: u64,
    /// Lower-case hex SHA-256 of the image.
    pub checksum: String,
}

// ============================================
// Release
// ============================================

/// Persisted release status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    /// Created, not yet picked up.
    Pending,
    /// Being rolled out.
    InProgress,
    /// Rolled back after failing health checks.
    RolledBack,
    /// Every targeted device updated.
    Completed,
}

impl ReleaseStatus {
    /// Stable lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::RolledBack => "rolled_back",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted rollout stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStage {
    /// Dispatching to canary waves.
    Canary,
    /// Dispatching to the rest of the fleet.
    Production,
    /// Fleet told to revert.
    Rollback,
    /// Rollout finished.
    Completed,
}

impl ReleaseStage {
    /// Stable lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Canary => "canary",
            Self::Production => "production",
            Self::Rollback => "rollback",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staged rollout of one firmware image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Release identity.
    pub id: ReleaseId,
    /// Firmware being rolled out.
    pub firmware_id: FirmwareId,
    /// Persisted status.
    pub status: ReleaseStatus,
    /// Persisted stage.
    pub stage: ReleaseStage,
    /// Opaque fleet selector supplied by the operator.
    #[serde(default)]
    pub target_selector: serde_json::Value,
    /// Opaque health policy supplied by the operator.
    #[serde(default)]
    pub health_policy: serde_json::Value,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

/// Fields supplied when creating a release.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelease {
    /// Firmware being rolled out.
    pub firmware_id: FirmwareId,
    /// Opaque fleet selector.
    pub target_selector: serde_json::Value,
    /// Opaque health policy.
    pub health_policy: serde_json::Value,
}

impl NewRelease {
    /// A release of `firmware_id` with empty selector and policy.
    #[must_use]
    pub fn for_firmware(firmware_id: FirmwareId) -> Self {
        Self {
            firmware_id,
            target_selector: serde_json::Value::Null,
            health_policy: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_stage_wire_names() {
        assert_eq!(serde_json::to_string(&ReleaseStatus::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(serde_json::to_string(&ReleaseStage::Rollback).unwrap(), "\"rollback\"");
        assert_eq!(ReleaseStatus::RolledBack.to_string(), "rolled_back");

        let stage: ReleaseStage = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(stage, ReleaseStage::Production);
    }
}
