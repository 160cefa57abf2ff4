//! ExecutionTrigger port - executor への実行開始通知
//!
//! "notify, don't wait": 一方向のシグナルで、配送は at-most-once。
//! trigger が成功してもジョブの実行は保証されません。完了は必ずポーリングで確認します。

use async_trait::async_trait;

use crate::domain::JobId;
use crate::error::OrchestratorError;

/// How a trigger call ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The executor acknowledged with a 2xx.
    Accepted,

    /// The call hit its timeout. The job is assumed to still be running
    /// server-side; this is not an error.
    TimedOut,
}

#[async_trait]
pub trait ExecutionTrigger: Send + Sync {
    /// Ask the executor to begin processing `job_id`.
    ///
    /// Re-triggering a job that is already running is safe per the executor
    /// contract.
    async fn trigger(&self, job_id: JobId) -> Result<TriggerOutcome, OrchestratorError>;
}

#[async_trait]
impl<T: ExecutionTrigger + ?Sized> ExecutionTrigger for std::sync::Arc<T> {
    async fn trigger(&self, job_id: JobId) -> Result<TriggerOutcome, OrchestratorError> {
        (**self).trigger(job_id).await
    }
}
