use std::time::Duration;

use thiserror::Error;

use crate::domain::JobId;
use crate::ports::StoreError;

/// Orchestration errors.
///
/// A job that reaches `Failed` is not represented here: it is a valid
/// terminal outcome returned as data. Trigger timeouts are not here either;
/// they surface as `TriggerOutcome::TimedOut`.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("not signed in: no session token available")]
    Auth,

    #[error("session token rejected by executor, sign in again")]
    Reauthenticate,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("executor request failed{}: {message}", http_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("polling timed out for job {job_id} after {elapsed:?}")]
    PollingTimeout { job_id: JobId, elapsed: Duration },

    #[error("job {0} is already being polled")]
    AlreadyPolling(JobId),

    #[error("circuit breaker open for job {0}")]
    CircuitBreakerOpen(JobId),

    #[error("polling cancelled for job {0}")]
    Cancelled(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl OrchestratorError {
    /// Worth trying again later without changing anything?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Transport { .. }
                | OrchestratorError::PollingTimeout { .. }
                | OrchestratorError::Store(StoreError::Unavailable(_))
        )
    }

    /// Rejected before any job read happened.
    pub fn is_guard_rejection(&self) -> bool {
        matches!(
            self,
            OrchestratorError::AlreadyPolling(_) | OrchestratorError::CircuitBreakerOpen(_)
        )
    }
}
