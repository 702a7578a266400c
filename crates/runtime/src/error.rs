//! Error types surfaced by the tracker runtime.
//!
//! Engines return [`TrackerError`]; the [`crate::Tracker`] façade is the
//! boundary where errors are classified, logged and dropped.
use thiserror::Error;

use tracker_core::{GroupId, ItemId, RecordError};

/// Failures reported by a scene store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scene store is unavailable")]
    Unavailable,

    #[error("scene store lock was poisoned")]
    LockPoisoned,

    #[error("scene store rejected the request: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    #[error("combatant {0} not found")]
    CombatantNotFound(ItemId),
}

impl TrackerError {
    /// Missing groups or entities are expected under concurrent edits and
    /// only warrant a warning.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GroupNotFound(_) | Self::CombatantNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
