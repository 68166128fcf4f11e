// ============================================
// File: crates/aura-server/src/orchestrator/mod.rs
// ============================================
//! # Release Orchestrator
//!
//! ## Creation Reason
//! Drives every release from `pending` to a terminal state: canary waves,
//! promotion to the whole fleet, completion, or rollback when devices
//! report too many failures.
//!
//! ## Main Functionality
//! - `Orchestrator::run`: polling control loop
//! - `Orchestrator::tick`: one pass over all releases
//! - `Orchestrator::attach_handlers`: feeds update reports into
//!   [`health::HealthTracker`] and logs telemetry
//!
//! ## Control Loop
//! ```text
//! ┌─────────────── every poll_interval ───────────────┐
//! │ list releases                                     │
//! │   pending      → start_release   (first wave)     │
//! │   in_progress  → monitor_release                  │
//! │                    ├ RollBack → rollback_release  │
//! │                    ├ Promote  → promote_release   │
//! │                    ├ Complete → complete_release  │
//! │                    └ Continue → next wave / widen │
//! │   terminal     → skip                             │
//! └───────────────────────────────────────────────────┘
//!
//! MQTT event loop ──update/status──▶ HealthTracker ◀── monitor_release
//! ```
//!
//! ## Rollout Progression
//! - Canary: the next wave (up to `canary_size` fresh devices) goes out
//!   once every device of the previous waves has reported
//! - Production: every device not yet commanded gets the update, including
//!   devices registered after promotion
//! - Exhausted fleet (all devices commanded, all reported): the stage
//!   advances unless the observed success rate is below threshold
//!
//! ## ⚠️ Important Note for Next Developer
//! - A per-device publish failure is logged and the device stays
//!   undispatched, so a later wave retries it
//! - Rollback commands that could not be published are kept and retried at
//!   the start of every tick until delivered, or until a newer update
//!   command reaches the device
//! - After a restart, health for in-progress releases starts from zero and
//!   the current stage is re-dispatched; devices must tolerate a repeated
//!   command for the version they already run
//! - `stop()` takes effect at the next wait boundary, never mid-tick
//!
//! ## Last Modified
//! v0.1.0 - Initial orchestrator

pub mod health;
pub mod state;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use aura_common::{DeviceId, ReleaseId};
use aura_transport::FleetClient;

use crate::error::{Result, ServerError};
use crate::storage::{Device, Firmware, RecordStore, Release};

pub use health::{HealthDecision, HealthPolicy, HealthTracker, ReleaseHealth, StatusAttribution};
pub use state::{ReleaseState, Transition};

// ============================================
// OrchestratorSettings
// ============================================

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Time between ticks.
    pub poll_interval: Duration,
    /// Maximum devices per canary wave.
    pub canary_size: usize,
    /// When set, devices download from `{base}/{firmware_id}.bin` instead
    /// of the stored location.
    pub firmware_base_url: Option<String>,
    /// Rollback/promotion thresholds.
    pub policy: HealthPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            canary_size: 5,
            firmware_base_url: None,
            policy: HealthPolicy::default(),
        }
    }
}

// ============================================
// Orchestrator
// ============================================

/// Staged-rollout control loop.
pub struct Orchestrator {
    records: Arc<dyn RecordStore>,
    fleet: FleetClient,
    health: Arc<HealthTracker>,
    settings: OrchestratorSettings,
    shutdown_tx: broadcast::Sender<()>,
    stopped: AtomicBool,
    /// device → rolled-back release whose rollback command was not sent
    undelivered_rollbacks: Mutex<HashMap<DeviceId, ReleaseId>>,
}

impl Orchestrator {
    /// Creates an orchestrator; call `attach_handlers` before `run`.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        fleet: FleetClient,
        settings: OrchestratorSettings,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            records,
            fleet,
            health: Arc::new(HealthTracker::new()),
            settings,
            shutdown_tx,
            stopped: AtomicBool::new(false),
            undelivered_rollbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Per-release health counters.
    #[must_use]
    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    /// Devices still owed a rollback command.
    #[must_use]
    pub fn undelivered_rollbacks(&self) -> usize {
        self.undelivered_rollbacks.lock().len()
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Subscribes the update-status and telemetry handlers.
    ///
    /// # Errors
    /// Returns error if either subscription cannot be registered.
    pub async fn attach_handlers(&self) -> Result<()> {
        let health = Arc::clone(&self.health);
        self.fleet
            .subscribe_to_update_status(move |report| {
                match health.record_status(&report.device_id, report.outcome()) {
                    StatusAttribution::Counted {
                        release_id,
                        succeeded,
                    } => info!(
                        device_id = %report.device_id,
                        release_id = %release_id,
                        succeeded,
                        error = report.error.as_deref().unwrap_or(""),
                        "Update result recorded"
                    ),
                    StatusAttribution::Duplicate(release_id) => debug!(
                        device_id = %report.device_id,
                        release_id = %release_id,
                        "Ignoring repeated update result"
                    ),
                    StatusAttribution::Progress(release_id) => debug!(
                        device_id = %report.device_id,
                        release_id = %release_id,
                        status = %report.status,
                        progress = report.progress,
                        "Update progress"
                    ),
                    StatusAttribution::Unassigned => warn!(
                        device_id = %report.device_id,
                        status = %report.status,
                        "Update report from device with no active release"
                    ),
                }
            })
            .await?;

        self.fleet
            .subscribe_to_telemetry(|t| {
                debug!(
                    device_id = %t.device_id,
                    status = %t.status,
                    battery_level = ?t.battery_level,
                    temperature = ?t.temperature,
                    uptime = ?t.uptime,
                    firmware_version = ?t.firmware_version,
                    "Telemetry"
                );
            })
            .await?;

        Ok(())
    }

    /// Runs ticks until [`Orchestrator::stop`] is called.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            canary_size = self.settings.canary_size,
            "Release orchestrator started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    if self.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    match self.tick().await {
                        Ok(()) => {}
                        Err(e) if e.is_retryable() => {
                            warn!(error = %e, "Orchestrator tick failed; retrying next interval");
                        }
                        Err(e) => error!(error = %e, "Orchestrator tick failed"),
                    }
                }
            }
        }

        info!("Release orchestrator stopped");
    }

    /// Signals [`Orchestrator::run`] to exit.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    /// One pass over all releases.
    ///
    /// # Errors
    /// Returns error only if the release list cannot be read; per-release
    /// failures are logged.
    pub async fn tick(&self) -> Result<()> {
        self.retry_rollbacks().await;

        let releases = self.records.list_releases().await?;

        for release in &releases {
            let state = match ReleaseState::from_record(release.status, release.stage) {
                Ok(s) => s,
                Err(e) => {
                    warn!(release_id = %release.id, error = %e, "Skipping release");
                    continue;
                }
            };

            if state.is_terminal() {
                continue;
            }

            let result = if state == ReleaseState::Pending {
                self.start_release(release).await
            } else {
                self.monitor_release(release).await
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_retryable() => {
                    warn!(release_id = %release.id, state = %state, error = %e, "Release step deferred");
                }
                Err(e) => {
                    error!(release_id = %release.id, state = %state, error = %e, "Release step failed");
                }
            }
        }

        Ok(())
    }

    /// Moves a pending release into canary and sends the first wave.
    ///
    /// # Errors
    /// Returns error if the release is not pending or a record cannot be
    /// read or written. Per-device publish failures are logged only.
    pub async fn start_release(&self, release: &Release) -> Result<()> {
        let next = current_state(release)?.apply(Transition::Start)?;
        self.persist(&release.id, next).await?;
        self.health.begin(release.id, next);

        let firmware = self.records.get_firmware(&release.firmware_id).await?;
        let devices = self.records.list_devices().await?;
        let sent = self
            .dispatch(&release.id, &firmware, &devices, Some(self.settings.canary_size))
            .await;

        info!(
            release_id = %release.id,
            version = %firmware.version,
            canary_devices = sent,
            fleet_size = devices.len(),
            "Release started"
        );
        Ok(())
    }

    /// Evaluates health and acts on the decision.
    ///
    /// # Errors
    /// Returns error if the release is not in progress or a record cannot be
    /// read or written.
    pub async fn monitor_release(&self, release: &Release) -> Result<()> {
        let state = current_state(release)?;
        if !state.is_active() {
            return Err(ServerError::invalid_transition(state, "monitor"));
        }

        if self.health.ensure(release.id, state) {
            info!(release_id = %release.id, state = %state, "Rebuilt health tracking for release");
        }
        let Some(health) = self.health.snapshot(&release.id) else {
            return Ok(());
        };

        debug!(
            release_id = %release.id,
            observed = health.devices_observed,
            successes = health.success_count,
            failures = health.failure_count,
            dispatched = health.dispatched_count(),
            superseded = health.superseded_count(),
            "Evaluating release health"
        );

        match self.settings.policy.evaluate(&health) {
            HealthDecision::RollBack => self.rollback_release(release).await,
            HealthDecision::Promote => self.promote_release(release).await,
            HealthDecision::Complete => self.complete_release(release).await,
            HealthDecision::Continue => self.advance_rollout(release, state, &health).await,
        }
    }

    /// Canary → production, then widens dispatch to the rest of the fleet.
    ///
    /// # Errors
    /// Returns error if the release is not in canary or cannot be updated.
    pub async fn promote_release(&self, release: &Release) -> Result<()> {
        let next = current_state(release)?.apply(Transition::Promote)?;
        self.persist(&release.id, next).await?;
        self.health.set_stage(&release.id, next);
        info!(release_id = %release.id, "Release promoted to production");

        match self.widen(release).await {
            Ok(sent) => debug!(release_id = %release.id, devices = sent, "Production dispatch"),
            Err(e) => warn!(
                release_id = %release.id,
                error = %e,
                "Production dispatch failed; retrying next tick"
            ),
        }
        Ok(())
    }

    /// Marks the release rolled back and tells every device to revert.
    ///
    /// # Errors
    /// Returns error if the release is not in progress or cannot be
    /// updated.
    pub async fn rollback_release(&self, release: &Release) -> Result<()> {
        let next = current_state(release)?.apply(Transition::RollBack)?;
        self.persist(&release.id, next).await?;
        let health = self.health.discard(&release.id);

        let devices = self.records.list_devices().await?;
        let mut failed = 0usize;
        for device in &devices {
            match self.fleet.publish_rollback_command(&device.id).await {
                Ok(()) => {
                    self.undelivered_rollbacks.lock().remove(&device.id);
                }
                Err(e) => {
                    failed += 1;
                    self.undelivered_rollbacks.lock().insert(device.id, release.id);
                    warn!(
                        release_id = %release.id,
                        device_id = %device.id,
                        error = %e,
                        "Failed to send rollback command; will retry"
                    );
                }
            }
        }

        warn!(
            release_id = %release.id,
            observed = health.as_ref().map_or(0, |h| h.devices_observed),
            success_rate = health.as_ref().map_or(1.0, ReleaseHealth::success_rate),
            devices = devices.len(),
            failed_commands = failed,
            "Release rolled back"
        );
        Ok(())
    }

    /// Marks the release completed and drops its health entry.
    ///
    /// # Errors
    /// Returns error if the release is not in production or cannot be
    /// updated.
    pub async fn complete_release(&self, release: &Release) -> Result<()> {
        let next = current_state(release)?.apply(Transition::Complete)?;
        self.persist(&release.id, next).await?;
        let health = self.health.discard(&release.id);

        info!(
            release_id = %release.id,
            observed = health.as_ref().map_or(0, |h| h.devices_observed),
            "Release completed"
        );
        Ok(())
    }

    /// Download URL handed to devices.
    #[must_use]
    pub fn firmware_url(&self, firmware: &Firmware) -> String {
        match &self.settings.firmware_base_url {
            Some(base) => format!("{}/{}.bin", base.trim_end_matches('/'), firmware.id),
            None => firmware.location.clone(),
        }
    }

    // ========================================
    // Rollout helpers
    // ========================================

    async fn advance_rollout(
        &self,
        release: &Release,
        state: ReleaseState,
        health: &ReleaseHealth,
    ) -> Result<()> {
        let firmware = self.records.get_firmware(&release.firmware_id).await?;
        let devices = self.records.list_devices().await?;

        let sent = match state {
            ReleaseState::Canary if health.awaiting_reports() == 0 => {
                self.dispatch(&release.id, &firmware, &devices, Some(self.settings.canary_size))
                    .await
            }
            ReleaseState::Production => self.dispatch(&release.id, &firmware, &devices, None).await,
            _ => 0,
        };

        if sent > 0 {
            info!(release_id = %release.id, state = %state, devices = sent, "Dispatched next wave");
            return Ok(());
        }

        let Some(latest) = self.health.snapshot(&release.id) else {
            return Ok(());
        };
        let exhausted = latest.awaiting_reports() == 0
            && devices.iter().all(|d| latest.is_dispatched(&d.id));
        if !exhausted {
            return Ok(());
        }

        debug!(release_id = %release.id, state = %state, "Fleet exhausted");
        match self.settings.policy.evaluate_exhausted(&latest) {
            HealthDecision::RollBack => self.rollback_release(release).await,
            HealthDecision::Promote => self.promote_release(release).await,
            HealthDecision::Complete => self.complete_release(release).await,
            HealthDecision::Continue => Ok(()),
        }
    }

    async fn retry_rollbacks(&self) {
        let pending: Vec<(DeviceId, ReleaseId)> = self
            .undelivered_rollbacks
            .lock()
            .iter()
            .map(|(device, release)| (*device, *release))
            .collect();
        if pending.is_empty() {
            return;
        }

        let mut delivered = 0usize;
        for (device, release_id) in pending {
            match self.fleet.publish_rollback_command(&device).await {
                Ok(()) => {
                    let mut undelivered = self.undelivered_rollbacks.lock();
                    if undelivered.get(&device) == Some(&release_id) {
                        undelivered.remove(&device);
                    }
                    delivered += 1;
                }
                Err(e) => debug!(
                    release_id = %release_id,
                    device_id = %device,
                    error = %e,
                    "Rollback command still undeliverable"
                ),
            }
        }

        info!(
            delivered,
            remaining = self.undelivered_rollbacks(),
            "Retried undelivered rollback commands"
        );
    }

    async fn widen(&self, release: &Release) -> Result<usize> {
        let firmware = self.records.get_firmware(&release.firmware_id).await?;
        let devices = self.records.list_devices().await?;
        Ok(self.dispatch(&release.id, &firmware, &devices, None).await)
    }

    /// Sends the update to devices not yet dispatched for this release, in
    /// list order, up to `limit`. Returns how many commands went out.
    async fn dispatch(
        &self,
        release_id: &ReleaseId,
        firmware: &Firmware,
        devices: &[Device],
        limit: Option<usize>,
    ) -> usize {
        let url = self.firmware_url(firmware);
        let limit = limit.unwrap_or(usize::MAX);
        let mut sent = 0;

        for device in devices {
            if sent >= limit {
                break;
            }
            // Claim before publishing so a status report racing the
            // publish is still attributed
            if !self.health.mark_dispatched(release_id, device.id) {
                continue;
            }

            match self
                .fleet
                .publish_update_command(&device.id, &url, &firmware.version, &firmware.checksum)
                .await
            {
                Ok(()) => {
                    // The new image supersedes any rollback still owed
                    self.undelivered_rollbacks.lock().remove(&device.id);
                    sent += 1;
                }
                Err(e) => {
                    self.health.unmark_dispatched(release_id, &device.id);
                    warn!(
                        release_id = %release_id,
                        device_id = %device.id,
                        error = %e,
                        "Failed to send update command"
                    );
                }
            }
        }

        sent
    }

    async fn persist(&self, id: &ReleaseId, state: ReleaseState) -> Result<Release> {
        let (status, stage) = state.to_record();
        Ok(self.records.update_release_state(id, status, stage).await?)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .field("tracked_releases", &self.health.len())
            .field("undelivered_rollbacks", &self.undelivered_rollbacks())
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn current_state(release: &Release) -> Result<ReleaseState> {
    ReleaseState::from_record(release.status, release.stage)
}

// ============================================
// Tests
// ============================================
