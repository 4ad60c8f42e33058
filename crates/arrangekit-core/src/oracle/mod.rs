//! The semantic oracle boundary.
//!
//! Deciding *which* layout pattern a user is after, and *which* corrections
//! move the canvas toward it, is delegated to an external service. The
//! pipeline only sees the [`SemanticOracle`] trait; its output is untrusted
//! and always checked before it touches the scene.

mod retry;
mod scripted;

pub use retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, DEFAULT_MULTIPLIER, RetryPolicy};
pub use scripted::ScriptedOracle;

use crate::intent::{Evaluation, Intent};
use crate::movement::Movement;
use crate::plan::Plan;
use crate::snapshot::Snapshot;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Oracle transport and service errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error (status {status})")]
    Server { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl OracleError {
    /// Whether trying the same call again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transport(_) | Self::Server { status: 500..=599 }
        )
    }

    /// Delay requested by the service, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}

/// Result type for oracle calls.
pub type OracleResult<T> = Result<T, OracleError>;

/// Boxed future for oracle calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// External decision-maker consulted by the pipeline.
///
/// Every call receives the current snapshot.
pub trait SemanticOracle: Send + Sync {
    /// Infer what the user meant by a movement.
    fn infer_intent(&self, movement: &Movement, snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Intent>>;

    /// Judge whether the canvas satisfies an intent, proposing corrections if not.
    fn evaluate(&self, intent: &Intent, snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Evaluation>>;

    /// Turn a free-form request into a plan of operations.
    fn plan(&self, request: &str, snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Plan>>;
}
