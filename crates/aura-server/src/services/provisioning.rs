// ============================================
// File: crates/aura-server/src/services/provisioning.rs
// ============================================
//! # Provisioning Service
//!
//! ## Creation Reason
//! Implements two-step device enrollment. A device proves it holds a
//! bootstrap token (Bootstrap), then redeems the challenge it was given
//! (Provision) for a CA-signed client certificate.
//!
//! ## Main Functionality
//! - `ProvisioningService::bootstrap`: token → challenge + expiry
//! - `ProvisioningService::provision`: challenge → identity material
//!
//! ## Enrollment Flow
//! ```text
//! Device                               Server
//!   │                                    │
//!   │── Bootstrap{token} ───────────────▶│ token exists & unprovisioned?
//!   │◀── {challenge, expires_at} ────────│ challenge → (expiry, token)
//!   │                                    │
//!   │── Provision{challenge, sig[, pk]} ▶│ consume challenge (single use)
//!   │                                    │ verify sig (if pk / required)
//!   │                                    │ device for token
//!   │                                    │ issue leaf cert
//!   │                                    │ mark provisioned (clears token)
//!   │◀── {device_id, cert, key, ca, ...} │
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The challenge is consumed BEFORE signature verification, so a bad
//!   signature burns the challenge and the device must Bootstrap again
//! - Error messages go to devices; internals are logged only
//!
//! ## Last Modified
//! v0.1.0 - Initial provisioning service

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use aura_common::time::{now, Timestamp};
use aura_common::{Challenge, DeviceId};
use aura_core::crypto::{verify_challenge_signature, CertificateAuthority};

use crate::error::ProvisioningError;
use crate::services::challenge::{ChallengeStore, ConsumeError};
use crate::storage::{RecordStore, StoreError};

// ============================================
// Settings
// ============================================

/// Provisioning behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningSettings {
    /// Challenge lifetime.
    pub challenge_ttl: Duration,
    /// Reject Provision requests without a verifiable device signature.
    pub require_signature: bool,
    /// Broker host handed to enrolled devices.
    pub transport_host: String,
    /// Broker port handed to enrolled devices.
    pub transport_port: u16,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            challenge_ttl: Duration::from_secs(300),
            require_signature: false,
            transport_host: "mqtt.aura.example.com".to_string(),
            transport_port: 8883,
        }
    }
}

// ============================================
// Messages
// ============================================

/// First enrollment step: present the factory token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapRequest {
    /// Factory-issued single-use token.
    #[serde(default, alias = "bootstrapToken")]
    pub bootstrap_token: String,
}

/// Challenge issued for a valid bootstrap token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapResponse {
    /// URL-safe base64 challenge.
    pub challenge: String,
    /// When the challenge stops being accepted.
    #[serde(alias = "expiresAt")]
    pub expires_at: Timestamp,
}

/// Second enrollment step: answer the challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// URL-safe base64 challenge.
    #[serde(default)]
    pub challenge: String,
    /// Device signature over the challenge.
    #[serde(default, alias = "signedChallenge")]
    pub signed_challenge: String,
    /// Hex Ed25519 public key; enables signature verification.
    #[serde(default, alias = "publicKey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Credentials handed to a newly enrolled device.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProvisionResponse {
    /// Enrolled device.
    #[serde(alias = "deviceId")]
    pub device_id: DeviceId,
    /// Device certificate (PEM).
    #[serde(alias = "clientCertificate")]
    pub client_certificate: String,
    /// Device private key (PEM).
    #[serde(alias = "clientKey")]
    pub client_key: String,
    /// Root certificate (PEM).
    #[serde(alias = "caCertificate")]
    pub ca_certificate: String,
    /// MQTT broker host for the device.
    #[serde(alias = "transportHost")]
    pub transport_host: String,
    /// MQTT broker port for the device.
    #[serde(alias = "transportPort")]
    pub transport_port: u16,
}

impl std::fmt::Debug for ProvisionResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionResponse")
            .field("device_id", &self.device_id)
            .field("transport_host", &self.transport_host)
            .field("transport_port", &self.transport_port)
            .finish_non_exhaustive()
    }
}

// ============================================
// ProvisioningService
// ============================================

/// Bootstrap/Provision request handler.
pub struct ProvisioningService {
    records: Arc<dyn RecordStore>,
    ca: Arc<CertificateAuthority>,
    challenges: Arc<ChallengeStore>,
    settings: ProvisioningSettings,
}

impl ProvisioningService {
    /// Creates the service over shared stores and the CA.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        ca: Arc<CertificateAuthority>,
        challenges: Arc<ChallengeStore>,
        settings: ProvisioningSettings,
    ) -> Self {
        Self {
            records,
            ca,
            challenges,
            settings,
        }
    }

    /// Outstanding challenges.
    #[must_use]
    pub fn challenges(&self) -> &Arc<ChallengeStore> {
        &self.challenges
    }

    /// Issuing CA.
    #[must_use]
    pub fn certificate_authority(&self) -> &Arc<CertificateAuthority> {
        &self.ca
    }

    /// Issues a challenge for an unprovisioned device's bootstrap token.
    ///
    /// # Errors
    /// - `InvalidArgument` for an empty token
    /// - `NotFound` if no unprovisioned device holds the token
    /// - `Internal` if the record store fails
    pub async fn bootstrap(
        &self,
        request: BootstrapRequest,
    ) -> Result<BootstrapResponse, ProvisioningError> {
        let token = request.bootstrap_token.trim();
        if token.is_empty() {
            return Err(ProvisioningError::invalid_argument("bootstrap token is required"));
        }

        let exists = self.records.bootstrap_token_exists(token).await.map_err(|e| {
            error!(error = %e, "Bootstrap token lookup failed");
            ProvisioningError::internal("failed to look up bootstrap token")
        })?;
        if !exists {
            debug!("Bootstrap with unknown or consumed token");
            return Err(ProvisioningError::not_found("no device for bootstrap token"));
        }

        let (challenge, expiry) = self.challenges.issue(token);
        debug!(expires_at = %expiry.deadline(), "Issued enrollment challenge");

        Ok(BootstrapResponse {
            challenge: challenge.to_string(),
            expires_at: expiry.deadline(),
        })
    }

    /// Redeems a challenge for a device certificate.
    ///
    /// # Errors
    /// - `InvalidArgument` for empty fields, an unknown challenge or a bad
    ///   signature
    /// - `DeadlineExceeded` if the challenge expired
    /// - `NotFound` if the device is gone or was provisioned concurrently
    /// - `Internal` for record store or CA failures
    pub async fn provision(
        &self,
        request: ProvisionRequest,
    ) -> Result<ProvisionResponse, ProvisioningError> {
        if request.challenge.is_empty() {
            return Err(ProvisioningError::invalid_argument("challenge is required"));
        }
        if request.signed_challenge.is_empty() {
            return Err(ProvisioningError::invalid_argument("signed challenge is required"));
        }

        let challenge: Challenge = request
            .challenge
            .parse()
            .map_err(|_| ProvisioningError::invalid_argument("unknown challenge"))?;

        let token = self
            .challenges
            .consume(&challenge, now())
            .map_err(|e| match e {
                ConsumeError::Unknown => ProvisioningError::invalid_argument("unknown challenge"),
                ConsumeError::Expired => {
                    ProvisioningError::deadline_exceeded("challenge has expired")
                }
            })?;

        self.check_signature(&request)?;

        let device = self
            .records
            .device_for_bootstrap_token(&token)
            .await
            .map_err(|e| store_error("resolve device", &e))?;

        let issued = self
            .ca
            .issue_device_certificate(&device.id.to_string())
            .map_err(|e| {
                error!(device_id = %device.id, error = %e, "Certificate issuance failed");
                ProvisioningError::internal("failed to issue certificate")
            })?;

        self.records
            .mark_device_provisioned(&device.id, &issued.serial_hex)
            .await
            .map_err(|e| store_error("mark provisioned", &e))?;

        info!(
            device_id = %device.id,
            serial = %issued.serial_hex,
            "Device provisioned"
        );

        Ok(ProvisionResponse {
            device_id: device.id,
            client_certificate: issued.certificate_pem,
            client_key: issued.private_key_pem.to_string(),
            ca_certificate: self.ca.root_certificate_pem().to_string(),
            transport_host: self.settings.transport_host.clone(),
            transport_port: self.settings.transport_port,
        })
    }

    fn check_signature(&self, request: &ProvisionRequest) -> Result<(), ProvisioningError> {
        let public_key = match request.public_key.as_deref().map(str::trim) {
            Some(pk) if !pk.is_empty() => pk,
            _ if self.settings.require_signature => {
                return Err(ProvisioningError::invalid_argument("public key is required"));
            }
            _ => return Ok(()),
        };

        verify_challenge_signature(public_key, &request.challenge, &request.signed_challenge)
            .map_err(|e| {
                if !e.is_client_error() {
                    error!(error = %e, "Challenge signature check failed");
                    return ProvisioningError::internal("signature check failed");
                }
                warn!(error = %e, "Challenge signature rejected");
                ProvisioningError::invalid_argument("challenge signature is invalid")
            })
    }
}

impl std::fmt::Debug for ProvisioningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningService")
            .field("settings", &self.settings)
            .field("outstanding_challenges", &self.challenges.len())
            .finish_non_exhaustive()
    }
}

fn store_error(operation: &str, e: &StoreError) -> ProvisioningError {
    match e {
        StoreError::NotFound { .. } | StoreError::AlreadyProvisioned(_) => {
            warn!(operation, error = %e, "Provision target unavailable");
            ProvisioningError::not_found("no device for this enrollment")
        }
        _ => {
            error!(operation, error = %e, "Record store failure during provision");
            ProvisioningError::internal("failed to update device record")
        }
    }
}

// ============================================
// Tests
// ============================================
