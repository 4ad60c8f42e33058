//! Session-level errors.

use crate::oracle::OracleError;
use crate::plan::PlanError;
use crate::scene::SceneError;
use thiserror::Error;

/// Errors that end a tick, a convergence run or a session call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArrangeError {
    #[error("oracle call failed: {0}")]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("a convergence cycle is already running")]
    Busy,
}

impl ArrangeError {
    /// Whether the session can keep polling after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Oracle(_) | Self::Busy)
    }
}

/// Result type for session calls.
pub type ArrangeResult<T> = Result<T, ArrangeError>;
