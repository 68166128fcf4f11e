// ============================================
// File: crates/aura-core/src/protocol/messages.rs
// ============================================
//! # Device Messages
//!
//! ## Creation Reason
//! Defines the JSON payloads exchanged with devices over the pub/sub
//! transport.
//!
//! ## Main Functionality
//! - `DeviceTelemetry`: periodic device report (device → platform)
//! - `UpdateCommand`: install a firmware image (platform → device)
//! - `UpdateStatus`: progress/outcome of an update (device → platform)
//! - `RollbackDirective`: revert to previous image (platform → device)
//!
//! ## Wire Format
//! ```text
//! telemetry  {"device_id","timestamp","battery_level"?,"temperature"?,
//!             "uptime"?,"firmware_version"?,"status"}
//! command    {"device_id","firmware_url","version","checksum"}
//! status     {"device_id","status","progress","error"?}
//! rollback   {"action":"rollback"}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Keys are snake_case on the wire; camelCase spellings are accepted on
//!   input for older device firmware
//! - Optional telemetry fields are omitted (not null) when absent
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use serde::{Deserialize, Serialize};

use aura_common::DeviceId;

/// Action value carried by every rollback directive.
pub const ROLLBACK_ACTION: &str = "rollback";

// ============================================
// WireMessage
// ============================================

/// Marker for payloads carried on device topics.
pub trait WireMessage: Serialize + for<'de> Deserialize<'de> {
    /// Short name used in logs and decode errors.
    const KIND: &'static str;
}

// ============================================
// DeviceTelemetry
// ============================================

/// Periodic device health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTelemetry {
    /// Reporting device.
    #[serde(alias = "deviceId")]
    pub device_id: DeviceId,
    /// Device clock, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Battery charge in percent.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "batteryLevel")]
    pub battery_level: Option<f64>,
    /// Board temperature in degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Seconds since boot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<i64>,
    /// Currently running firmware version.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "firmwareVersion")]
    pub firmware_version: Option<String>,
    /// Free-form device status (e.g. "online").
    pub status: String,
}

impl WireMessage for DeviceTelemetry {
    const KIND: &'static str = "telemetry";
}

// ============================================
// UpdateCommand
// ============================================

/// Instruction for a device to fetch and install a firmware image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCommand {
    /// Target device.
    #[serde(alias = "deviceId")]
    pub device_id: DeviceId,
    /// Where the device downloads the image from.
    #[serde(alias = "firmwareUrl")]
    pub firmware_url: String,
    /// Firmware version being installed.
    pub version: String,
    /// Lower-case hex SHA-256 of the image.
    pub checksum: String,
}

impl WireMessage for UpdateCommand {
    const KIND: &'static str = "update command";
}

// ============================================
// UpdateStatus
// ============================================

/// Classification of an update-status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOutcome {
    /// Image installed and running.
    Succeeded,
    /// Installation failed.
    Failed,
    /// Download/verify/install still running.
    InProgress,
}

/// Progress or outcome of an update on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    /// Reporting device.
    #[serde(alias = "deviceId")]
    pub device_id: DeviceId,
    /// Device-reported state ("downloading", "completed", "failed", ...).
    pub status: String,
    /// Percent complete.
    #[serde(default)]
    pub progress: i32,
    /// Failure description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateStatus {
    /// Maps the free-form status onto an outcome.
    ///
    /// `completed`/`success`/`succeeded` count as success and
    /// `failed`/`failure`/`error` as failure (case-insensitive); anything
    /// else is progress.
    #[must_use]
    pub fn outcome(&self) -> UpdateOutcome {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "completed" | "success" | "succeeded" => UpdateOutcome::Succeeded,
            "failed" | "failure" | "error" => UpdateOutcome::Failed,
            _ => UpdateOutcome::InProgress,
        }
    }
}

impl WireMessage for UpdateStatus {
    const KIND: &'static str = "update status";
}

// ============================================
// RollbackDirective
// ============================================

/// Fixed rollback instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackDirective {
    /// Always [`ROLLBACK_ACTION`].
    pub action: String,
}

impl Default for RollbackDirective {
    fn default() -> Self {
        Self {
            action: ROLLBACK_ACTION.to_string(),
        }
    }
}

impl WireMessage for RollbackDirective {
    const KIND: &'static str = "rollback directive";
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let mut status = UpdateStatus {
            device_id: DeviceId::generate(),
            status: "Completed".into(),
            progress: 100,
            error: None,
        };
        assert_eq!(status.outcome(), UpdateOutcome::Succeeded);

        status.status = "failed".into();
        assert_eq!(status.outcome(), UpdateOutcome::Failed);

        status.status = "downloading".into();
        assert_eq!(status.outcome(), UpdateOutcome::InProgress);
    }

    #[test]
    fn test_rollback_directive_default() {
        assert_eq!(RollbackDirective::default().action, "rollback");
    }
}
