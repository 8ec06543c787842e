use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::timers::repo_types::Timer;

/// Failures raised by a `TimerStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timer {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage call `{op}` exceeded its deadline ({budget:?} budget)")]
    Timeout { op: &'static str, budget: Duration },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The previously active timer was finalized, then creating the new one
    /// failed. The stopped timer stays stopped.
    #[error("stopped timer {} ({}) but failed to start a new one: {source}", .stopped.id, .stopped.task_name)]
    StartFailedAfterStop {
        stopped: Box<Timer>,
        #[source]
        source: StoreError,
    },

    #[error("invalid range: {0}")]
    InvalidRange(String),
}

pub type TimerResult<T> = Result<T, TimerError>;
