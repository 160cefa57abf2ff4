//! Observability - ログ初期化とステータス集計
//!
//! - `init_tracing`: `RUST_LOG`（既定 `info`）で絞る fmt subscriber
//! - `JobCounts`: ジョブ一覧のステータス別件数（status 表示用）

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::domain::{FailureClass, Job, JobStatus, classify_failure};

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `failed` refused by content moderation.
    pub policy_blocked: usize,
}

impl JobCounts {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Succeeded => counts.succeeded += 1,
                JobStatus::Failed => counts.failed += 1,
            }
            if classify_failure(job) == Some(FailureClass::PolicyBlock) {
                counts.policy_blocked += 1;
            }
        }
        counts
    }
}
