//! Shared error types for the services crate.

use thiserror::Error;

use practice_core::model::SummaryError;
use storage::StorageError;

use crate::sessions::SessionPhase;

/// Errors emitted by `PlaybackController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("template has no playable blocks")]
    Empty,
    #[error("session already started")]
    AlreadyStarted,
    #[error("session is {phase:?}, expected it to be in progress")]
    NotInProgress { phase: SessionPhase },
    #[error("session was left without a summary")]
    Exited,
    #[error("resume snapshot does not fit the template: {0}")]
    InvalidSnapshot(String),
    #[error(transparent)]
    Snapshot(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while resolving the confirm-exit overlay.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExitError {
    #[error("saving progress is not available for this session")]
    SaveUnavailable,
    #[error("no exit confirmation is open")]
    NotConfirming,
    #[error(transparent)]
    Snapshot(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SessionFinalizer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FinalizeError {
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
