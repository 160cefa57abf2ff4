//! Job record and status management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{JobId, OwnerId};
use super::payload::{JobInput, JobKind, JobOutput};

/// Job status.
///
/// State transitions:
/// - Queued -> Running -> Succeeded
/// - Queued -> Running -> Failed
/// - Queued -> Failed / Succeeded (executor may finish without reporting Running)
///
/// Terminal states never transition again, and a job is never re-queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, waiting for the executor to pick it up.
    Queued,

    /// Picked up by the executor.
    Running,

    /// Finished with a result.
    Succeeded,

    /// Finished with an error message.
    Failed,
}

impl JobStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub const ACTIVE: [JobStatus; 2] = [JobStatus::Queued, JobStatus::Running];
    pub const TERMINAL: [JobStatus; 2] = [JobStatus::Succeeded, JobStatus::Failed];
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("job {job_id} cannot move from {from:?} to {to:?}")]
    Invalid {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job {job_id} is {expected} but result is {actual}")]
    KindMismatch {
        job_id: JobId,
        expected: JobKind,
        actual: JobKind,
    },
}

/// Job record: the unit of asynchronous, externally executed work.
///
/// The orchestrator only ever reads these. Status changes are applied by the
/// store on behalf of the executor through the transition methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner: OwnerId,
    pub input: JobInput,
    pub status: JobStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A freshly created job. Always `Queued`.
    pub fn new(id: JobId, owner: OwnerId, input: JobInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            input,
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.input.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Queued -> Running.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != JobStatus::Queued {
            return Err(self.invalid(JobStatus::Running));
        }
        self.status = JobStatus::Running;
        self.updated_at = now;
        Ok(())
    }

    /// Non-terminal -> Succeeded, attaching the result.
    pub fn succeed(
        &mut self,
        output: JobOutput,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(self.invalid(JobStatus::Succeeded));
        }
        if output.kind() != self.kind() {
            return Err(TransitionError::KindMismatch {
                job_id: self.id,
                expected: self.kind(),
                actual: output.kind(),
            });
        }
        self.status = JobStatus::Succeeded;
        self.result = Some(output);
        self.updated_at = now;
        Ok(())
    }

    /// Non-terminal -> Failed, attaching a human-readable message.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(self.invalid(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.updated_at = now;
        Ok(())
    }

    fn invalid(&self, to: JobStatus) -> TransitionError {
        TransitionError::Invalid {
            job_id: self.id,
            from: self.status,
            to,
        }
    }
}
