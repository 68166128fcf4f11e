// ============================================
// File: crates/aura-server/src/orchestrator/health.rs
// ============================================
//! # Release Health
//!
//! ## Creation Reason
//! Promotion and rollback decisions are made from device update reports.
//! This module counts those reports per release and turns the counts into
//! a decision.
//!
//! ## Main Functionality
//! - `HealthPolicy`: thresholds, with the defaults below
//! - `ReleaseHealth`: counters plus dispatch bookkeeping for one release
//! - `HealthTracker`: the shared map, fed by the update-status handler and
//!   read by the poll loop
//!
//! ## Decision Table
//! ```text
//! rate = successes / observed          (1.0 while nothing observed)
//!
//! rate < 0.80 && observed >= 5      → RollBack
//! canary      && observed > 10      → Promote
//! production  && observed > 50      → Complete
//! otherwise                         → Continue
//! ```
//!
//! ## Report Attribution
//! A report is charged to the release that last commanded the device. Only
//! the first terminal report per device per release is counted, so broker
//! redelivery cannot inflate the counters. When a newer release re-commands
//! a device, the older release marks it superseded and stops waiting for
//! it, so overlapping releases still drain their canary waves.
//!
//! ## ⚠️ Important Note for Next Developer
//! - One mutex guards both maps; hold it for a single read-modify-write and
//!   never across an `.await`
//! - Entries are discarded on terminal transitions; a restarted server
//!   rebuilds them from zero
//!
//! ## Last Modified
//! v0.1.0 - Initial health tracking

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use aura_common::time::{now, Timestamp};
use aura_common::{DeviceId, ReleaseId};
use aura_core::protocol::UpdateOutcome;

use crate::error::{Result, ServerError};
use crate::orchestrator::state::ReleaseState;

// ============================================
// HealthPolicy
// ============================================

fn default_rollback_threshold() -> f64 {
    0.8
}

fn default_min_observed_for_rollback() -> u32 {
    5
}

fn default_canary_promotion_observed() -> u32 {
    10
}

fn default_production_completion_observed() -> u32 {
    50
}

/// Promotion and rollback thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Roll back when the success rate drops below this.
    #[serde(default = "default_rollback_threshold")]
    pub rollback_threshold: f64,

    /// Minimum observed devices before a rollback can trigger.
    #[serde(default = "default_min_observed_for_rollback")]
    pub min_observed_for_rollback: u32,

    /// Promote canary once strictly more devices than this have reported.
    #[serde(default = "default_canary_promotion_observed")]
    pub canary_promotion_observed: u32,

    /// Complete production once strictly more devices than this have
    /// reported.
    #[serde(default = "default_production_completion_observed")]
    pub production_completion_observed: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            rollback_threshold: default_rollback_threshold(),
            min_observed_for_rollback: default_min_observed_for_rollback(),
            canary_promotion_observed: default_canary_promotion_observed(),
            production_completion_observed: default_production_completion_observed(),
        }
    }
}

/// What the orchestrator should do with a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthDecision {
    /// Success rate fell below the threshold.
    RollBack,
    /// Canary is healthy enough to widen.
    Promote,
    /// Production has enough successful reports.
    Complete,
    /// Keep dispatching and wait.
    Continue,
}

impl HealthPolicy {
    /// Validates the thresholds.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.rollback_threshold) {
            return Err(ServerError::config_invalid(
                "orchestrator.health.rollback_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.min_observed_for_rollback == 0 {
            return Err(ServerError::config_invalid(
                "orchestrator.health.min_observed_for_rollback",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Applies the decision table.
    #[must_use]
    pub fn evaluate(&self, health: &ReleaseHealth) -> HealthDecision {
        let observed = health.devices_observed;

        if health.success_rate() < self.rollback_threshold
            && observed >= self.min_observed_for_rollback
        {
            return HealthDecision::RollBack;
        }

        match health.stage {
            ReleaseState::Canary if observed > self.canary_promotion_observed => {
                HealthDecision::Promote
            }
            ReleaseState::Production if observed > self.production_completion_observed => {
                HealthDecision::Complete
            }
            _ => HealthDecision::Continue,
        }
    }

    /// Decision once every device has been commanded and has reported.
    ///
    /// The count thresholds can no longer be reached, so the stage advances
    /// unless what was observed is unhealthy.
    #[must_use]
    pub fn evaluate_exhausted(&self, health: &ReleaseHealth) -> HealthDecision {
        if health.devices_observed >= 1 && health.success_rate() < self.rollback_threshold {
            return HealthDecision::RollBack;
        }

        match health.stage {
            ReleaseState::Canary => HealthDecision::Promote,
            ReleaseState::Production => HealthDecision::Complete,
            _ => HealthDecision::Continue,
        }
    }
}

// ============================================
// ReleaseHealth
// ============================================

/// Counters and dispatch bookkeeping for one in-progress release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseHealth {
    /// Terminal reports that succeeded.
    pub success_count: u32,
    /// Terminal reports that failed.
    pub failure_count: u32,
    /// Devices with a counted terminal report.
    pub devices_observed: u32,
    /// Rollout state this entry tracks.
    pub stage: ReleaseState,
    /// Last counter or stage change.
    pub last_update: Timestamp,
    dispatched: HashSet<DeviceId>,
    reported: HashSet<DeviceId>,
    /// Dispatched devices since re-commanded by another release, keyed to
    /// that release.
    superseded: HashMap<DeviceId, ReleaseId>,
}

impl ReleaseHealth {
    fn new(stage: ReleaseState) -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            devices_observed: 0,
            stage,
            last_update: now(),
            dispatched: HashSet::new(),
            reported: HashSet::new(),
            superseded: HashMap::new(),
        }
    }

    /// Successes over observed; 1.0 while nothing has been observed.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.devices_observed == 0 {
            return 1.0;
        }
        f64::from(self.success_count) / f64::from(self.devices_observed)
    }

    /// Returns `true` if `device` was commanded for this release.
    #[must_use]
    pub fn is_dispatched(&self, device: &DeviceId) -> bool {
        self.dispatched.contains(device)
    }

    /// Number of commanded devices.
    #[must_use]
    pub fn dispatched_count(&self) -> usize {
        self.dispatched.len()
    }

    /// Dispatched devices later taken over by another release.
    #[must_use]
    pub fn superseded_count(&self) -> usize {
        self.superseded.len()
    }

    /// Dispatched devices that still owe this release a terminal report.
    ///
    /// A device re-commanded by another release reports to that release,
    /// so it is no longer awaited here.
    #[must_use]
    pub fn awaiting_reports(&self) -> usize {
        self.dispatched
            .iter()
            .filter(|d| !self.reported.contains(*d) && !self.superseded.contains_key(*d))
            .count()
    }
}

// ============================================
// HealthTracker
// ============================================

/// How an update-status report was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribution {
    /// First terminal report from this device for the release.
    Counted {
        /// Release the report counted toward.
        release_id: ReleaseId,
        /// Whether the update succeeded.
        succeeded: bool,
    },
    /// Terminal report already counted.
    Duplicate(ReleaseId),
    /// Non-terminal progress report.
    Progress(ReleaseId),
    /// No in-progress release commanded this device.
    Unassigned,
}

#[derive(Debug, Default)]
struct TrackerState {
    releases: HashMap<ReleaseId, ReleaseHealth>,
    /// device → release that last commanded it
    assignments: HashMap<DeviceId, ReleaseId>,
}

impl TrackerState {
    fn drop_assignments(&mut self, release_id: &ReleaseId) {
        self.assignments.retain(|_, r| r != release_id);
    }
}

/// Shared per-release health map.
#[derive(Debug, Default)]
pub struct HealthTracker {
    state: Mutex<TrackerState>,
}

impl HealthTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts fresh accounting for `release_id`, replacing any previous
    /// entry.
    pub fn begin(&self, release_id: ReleaseId, stage: ReleaseState) {
        let mut state = self.state.lock();
        state.drop_assignments(&release_id);
        state.releases.insert(release_id, ReleaseHealth::new(stage));
    }

    /// Creates an entry if none exists; returns `true` if it did.
    pub fn ensure(&self, release_id: ReleaseId, stage: ReleaseState) -> bool {
        let mut state = self.state.lock();
        if state.releases.contains_key(&release_id) {
            return false;
        }
        state.releases.insert(release_id, ReleaseHealth::new(stage));
        true
    }

    /// Records a stage change for a tracked release.
    pub fn set_stage(&self, release_id: &ReleaseId, stage: ReleaseState) {
        if let Some(health) = self.state.lock().releases.get_mut(release_id) {
            health.stage = stage;
            health.last_update = now();
        }
    }

    /// Records that `device` was sent an update for `release_id`.
    ///
    /// Returns `false` if the release is not tracked or the device was
    /// already dispatched. A release that commanded the device earlier
    /// stops waiting for its report.
    pub fn mark_dispatched(&self, release_id: &ReleaseId, device: DeviceId) -> bool {
        let mut state = self.state.lock();
        let Some(health) = state.releases.get_mut(release_id) else {
            return false;
        };
        if !health.dispatched.insert(device) {
            return false;
        }
        health.superseded.remove(&device);

        let previous = state.assignments.insert(device, *release_id);
        if let Some(previous) = previous.filter(|p| p != release_id) {
            if let Some(older) = state.releases.get_mut(&previous) {
                older.superseded.insert(device, *release_id);
            }
        }
        true
    }

    /// Reverts `mark_dispatched` after a failed publish, handing the device
    /// back to the release it was taken from.
    pub fn unmark_dispatched(&self, release_id: &ReleaseId, device: &DeviceId) {
        let mut state = self.state.lock();
        if let Some(health) = state.releases.get_mut(release_id) {
            health.dispatched.remove(device);
        }
        if state.assignments.get(device) != Some(release_id) {
            return;
        }
        state.assignments.remove(device);

        let restored = state
            .releases
            .iter_mut()
            .find(|(_, health)| health.superseded.get(device) == Some(release_id))
            .map(|(id, health)| {
                health.superseded.remove(device);
                *id
            });
        if let Some(previous) = restored {
            state.assignments.insert(*device, previous);
        }
    }

    /// Attributes an update-status report.
    pub fn record_status(&self, device: &DeviceId, outcome: UpdateOutcome) -> StatusAttribution {
        let mut state = self.state.lock();
        let Some(release_id) = state.assignments.get(device).copied() else {
            return StatusAttribution::Unassigned;
        };
        let Some(health) = state.releases.get_mut(&release_id) else {
            return StatusAttribution::Unassigned;
        };

        let succeeded = match outcome {
            UpdateOutcome::InProgress => return StatusAttribution::Progress(release_id),
            UpdateOutcome::Succeeded => true,
            UpdateOutcome::Failed => false,
        };

        if !health.reported.insert(*device) {
            return StatusAttribution::Duplicate(release_id);
        }

        health.devices_observed += 1;
        if succeeded {
            health.success_count += 1;
        } else {
            health.failure_count += 1;
        }
        health.last_update = now();

        StatusAttribution::Counted {
            release_id,
            succeeded,
        }
    }

    /// Returns a copy of the entry.
    #[must_use]
    pub fn snapshot(&self, release_id: &ReleaseId) -> Option<ReleaseHealth> {
        self.state.lock().releases.get(release_id).cloned()
    }

    /// Removes the entry and every assignment pointing at it.
    pub fn discard(&self, release_id: &ReleaseId) -> Option<ReleaseHealth> {
        let mut state = self.state.lock();
        state.drop_assignments(release_id);
        state.releases.remove(release_id)
    }

    /// Returns `true` if `release_id` is tracked.
    #[must_use]
    pub fn contains(&self, release_id: &ReleaseId) -> bool {
        self.state.lock().releases.contains_key(release_id)
    }

    /// Number of tracked releases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().releases.len()
    }

    /// Returns `true` if no release is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().releases.is_empty()
    }
}

// ============================================
// Tests
// ============================================
