// ============================================
// File: crates/aura-server/src/orchestrator/state.rs
// ============================================
//! # Release State Machine
//!
//! ## Creation Reason
//! Release records persist a (status, stage) pair. Only five pairs are
//! meaningful; this module maps them to a closed enum and owns the legal
//! transitions between them.
//!
//! ## Release Lifecycle
//! ```text
//! ┌─────────┐ Start ┌────────┐ Promote ┌────────────┐ Complete ┌───────────┐
//! │ Pending │──────►│ Canary │────────►│ Production │─────────►│ Completed │
//! └─────────┘       └───┬────┘         └─────┬──────┘          └───────────┘
//!                       │ RollBack           │ RollBack
//!                       ▼                    ▼
//!                  ┌──────────────────────────────┐
//!                  │          RolledBack          │
//!                  └──────────────────────────────┘
//! ```
//!
//! ## Persisted Form
//! | State      | status        | stage        |
//! |------------|---------------|--------------|
//! | Pending    | `pending`     | `canary`     |
//! | Canary     | `in_progress` | `canary`     |
//! | Production | `in_progress` | `production` |
//! | RolledBack | `rolled_back` | `rollback`   |
//! | Completed  | `completed`   | `completed`  |
//!
//! ## Last Modified
//! v0.1.0 - Initial state machine

use std::fmt;

use crate::error::{Result, ServerError};
use crate::storage::{ReleaseStage, ReleaseStatus};

/// Where a release is in its rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseState {
    /// Not yet started.
    Pending,
    /// Dispatching canary waves.
    Canary,
    /// Dispatching to the remaining fleet.
    Production,
    /// Terminal: rolled back.
    RolledBack,
    /// Terminal: completed.
    Completed,
}

/// An orchestrator action on a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Pending to canary.
    Start,
    /// Canary to production.
    Promote,
    /// Production to completed.
    Complete,
    /// Canary or production to rolled back.
    RollBack,
}

impl ReleaseState {
    /// Maps a persisted pair to its state.
    ///
    /// # Errors
    /// Returns `InvalidReleaseState` for any pair outside the table above.
    pub fn from_record(status: ReleaseStatus, stage: ReleaseStage) -> Result<Self> {
        use ReleaseStage as G;
        use ReleaseStatus as S;

        match (status, stage) {
            (S::Pending, G::Canary) => Ok(Self::Pending),
            (S::InProgress, G::Canary) => Ok(Self::Canary),
            (S::InProgress, G::Production) => Ok(Self::Production),
            (S::RolledBack, G::Rollback) => Ok(Self::RolledBack),
            (S::Completed, G::Completed) => Ok(Self::Completed),
            _ => Err(ServerError::InvalidReleaseState {
                status: status.to_string(),
                stage: stage.to_string(),
            }),
        }
    }

    /// Returns the persisted pair for this state.
    #[must_use]
    pub const fn to_record(self) -> (ReleaseStatus, ReleaseStage) {
        match self {
            Self::Pending => (ReleaseStatus::Pending, ReleaseStage::Canary),
            Self::Canary => (ReleaseStatus::InProgress, ReleaseStage::Canary),
            Self::Production => (ReleaseStatus::InProgress, ReleaseStage::Production),
            Self::RolledBack => (ReleaseStatus::RolledBack, ReleaseStage::Rollback),
            Self::Completed => (ReleaseStatus::Completed, ReleaseStage::Completed),
        }
    }

    /// Applies `transition`, returning the next state.
    ///
    /// # Errors
    /// Returns `InvalidTransition` if the transition is not legal here.
    pub fn apply(self, transition: Transition) -> Result<Self> {
        use Transition as T;

        match (self, transition) {
            (Self::Pending, T::Start) => Ok(Self::Canary),
            (Self::Canary, T::Promote) => Ok(Self::Production),
            (Self::Production, T::Complete) => Ok(Self::Completed),
            (Self::Canary | Self::Production, T::RollBack) => Ok(Self::RolledBack),
            _ => Err(ServerError::invalid_transition(self, transition)),
        }
    }

    /// Returns `true` for states no transition leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::RolledBack | Self::Completed)
    }

    /// Returns `true` for the in-progress states.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Canary | Self::Production)
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Canary => write!(f, "in_progress(canary)"),
            Self::Production => write!(f, "in_progress(production)"),
            Self::RolledBack => write!(f, "rolled_back"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Promote => write!(f, "promote"),
            Self::Complete => write!(f, "complete"),
            Self::RollBack => write!(f, "rollback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ReleaseState; 5] = [
        ReleaseState::Pending,
        ReleaseState::Canary,
        ReleaseState::Production,
        ReleaseState::RolledBack,
        ReleaseState::Completed,
    ];

    #[test]
    fn test_record_mapping_is_bijective() {
        for state in ALL {
            let (status, stage) = state.to_record();
            assert_eq!(ReleaseState::from_record(status, stage).unwrap(), state);
        }
    }

    #[test]
    fn test_invalid_pairs_rejected() {
        let err = ReleaseState::from_record(ReleaseStatus::Pending, ReleaseStage::Production)
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidReleaseState { .. }));
        assert!(ReleaseState::from_record(ReleaseStatus::Completed, ReleaseStage::Canary).is_err());
        assert!(
            ReleaseState::from_record(ReleaseStatus::InProgress, ReleaseStage::Rollback).is_err()
        );
    }

    #[test]
    fn test_happy_path() {
        let state = ReleaseState::Pending
            .apply(Transition::Start)
            .and_then(|s| s.apply(Transition::Promote))
            .and_then(|s| s.apply(Transition::Complete))
            .unwrap();
        assert_eq!(state, ReleaseState::Completed);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(ReleaseState::Pending.apply(Transition::Promote).is_err());
        assert!(ReleaseState::Pending.apply(Transition::RollBack).is_err());
        assert!(ReleaseState::Canary.apply(Transition::Complete).is_err());
        assert!(ReleaseState::Production.apply(Transition::Promote).is_err());

        for terminal in [ReleaseState::RolledBack, ReleaseState::Completed] {
            for t in [Transition::Start, Transition::Promote, Transition::Complete, Transition::RollBack] {
                assert!(terminal.apply(t).is_err(), "{terminal} accepted {t}");
            }
        }
    }

    #[test]
    fn test_rollback_from_active() {
        assert_eq!(ReleaseState::Canary.apply(Transition::RollBack).unwrap(), ReleaseState::RolledBack);
        assert_eq!(
            ReleaseState::Production.apply(Transition::RollBack).unwrap(),
            ReleaseState::RolledBack
        );
    }
}
