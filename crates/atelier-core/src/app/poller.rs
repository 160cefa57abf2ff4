//! Poller - ジョブが終端状態になるまで読み直す
//!
//! # 2 つの戦略
//! - **exponential backoff**: 間隔を倍々に伸ばす（上限あり）。試行回数で打ち切り
//! - **fixed interval**: 一定間隔。経過時間で打ち切り
//!
//! どちらも PollingGuard の permit を持っている間だけ読み、
//! 戻るとき（成功・エラー・キャンセル）に permit を drop して解放します。
//! すべての suspension point（読み取り・sleep）は CancellationToken と競争させます。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::BackoffPolicy;
use super::config::PollerConfig;
use super::guard::PollingGuard;
use crate::domain::{Job, JobId, JobStatus};
use crate::error::OrchestratorError;
use crate::ports::JobStore;

pub struct Poller<S> {
    store: S,
    guard: Arc<PollingGuard>,
    config: PollerConfig,
}

impl<S: JobStore> Poller<S> {
    pub fn new(store: S, guard: Arc<PollingGuard>, config: PollerConfig) -> Self {
        Self {
            store,
            guard,
            config,
        }
    }

    pub fn guard(&self) -> &Arc<PollingGuard> {
        &self.guard
    }

    /// Exponential-backoff poll.
    ///
    /// Reads at most `max_attempts` times, sleeping `initial_interval`,
    /// then twice that, and so on up to the configured cap. Returns the job
    /// once it is terminal (a `Failed` job is returned as data).
    ///
    /// Failure bookkeeping: read errors, attempt exhaustion and an observed
    /// `Failed` status each count one failure; `Succeeded` clears the count.
    pub async fn poll_with_backoff(
        &self,
        job_id: JobId,
        max_attempts: u32,
        initial_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        let _permit = self.guard.start_polling(job_id)?;
        let started = Instant::now();
        let backoff = BackoffPolicy::new(initial_interval, self.config.max_interval);

        for attempt in 1..=max_attempts {
            match cancellable(cancel, job_id, self.store.get_job(job_id)).await? {
                Err(e) => {
                    let failures = self.guard.record_failure(job_id);
                    warn!(%job_id, attempt, failures, error = %e, "job read failed");
                    return Err(e.into());
                }
                Ok(Some(job)) if job.is_terminal() => {
                    info!(%job_id, attempt, status = ?job.status, "job reached terminal state");
                    return Ok(self.settle(job));
                }
                Ok(Some(job)) => {
                    debug!(%job_id, attempt, status = ?job.status, "job still in flight");
                }
                Ok(None) if attempt == max_attempts => {
                    self.guard.record_failure(job_id);
                    warn!(%job_id, attempt, "job never became visible");
                    return Err(OrchestratorError::JobNotFound(job_id));
                }
                Ok(None) => {
                    debug!(%job_id, attempt, "job not visible yet");
                }
            }

            if attempt < max_attempts {
                let interval = backoff.interval(attempt);
                debug!(%job_id, attempt, interval_ms = interval.as_millis() as u64, "backing off");
                cancellable(cancel, job_id, sleep(interval)).await?;
            }
        }

        let failures = self.guard.record_failure(job_id);
        let elapsed = started.elapsed();
        warn!(%job_id, max_attempts, failures, ?elapsed, "polling attempts exhausted");
        Err(OrchestratorError::PollingTimeout { job_id, elapsed })
    }

    /// Backoff poll plus one unguarded read after a timeout.
    ///
    /// Closes the race where the job turns terminal just as the loop gives up.
    pub async fn poll_with_final_check(
        &self,
        job_id: JobId,
        max_attempts: u32,
        initial_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        match self
            .poll_with_backoff(job_id, max_attempts, initial_interval, cancel)
            .await
        {
            Err(timeout @ OrchestratorError::PollingTimeout { .. }) => {
                debug!(%job_id, "final check after polling timeout");
                match cancellable(cancel, job_id, self.store.get_job(job_id)).await? {
                    Ok(Some(job)) if job.is_terminal() => {
                        info!(%job_id, status = ?job.status, "final check found terminal job");
                        if job.status == JobStatus::Succeeded {
                            self.guard.record_success(job_id);
                        }
                        Ok(job)
                    }
                    _ => Err(timeout),
                }
            }
            other => other,
        }
    }

    /// Fixed-interval poll bounded by wall time.
    ///
    /// Shares the dedup set with the backoff poll but neither consults nor
    /// updates failure counts. A read error returns immediately.
    pub async fn poll_fixed_interval(
        &self,
        job_id: JobId,
        max_duration: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        let _permit = self.guard.claim(job_id)?;
        let started = Instant::now();
        let mut reads = 0u32;

        while started.elapsed() < max_duration {
            reads += 1;
            match cancellable(cancel, job_id, self.store.get_job(job_id)).await? {
                Err(e) => {
                    warn!(%job_id, reads, error = %e, "job read failed");
                    return Err(e.into());
                }
                Ok(Some(job)) if job.is_terminal() => {
                    info!(%job_id, reads, status = ?job.status, "job reached terminal state");
                    return Ok(job);
                }
                Ok(job) => {
                    debug!(%job_id, reads, status = ?job.map(|j| j.status), "job still in flight");
                }
            }
            cancellable(cancel, job_id, sleep(interval)).await?;
        }

        let elapsed = started.elapsed();
        warn!(%job_id, reads, ?elapsed, "fixed-interval polling timed out");
        Err(OrchestratorError::PollingTimeout { job_id, elapsed })
    }

    /// One direct read, outside the guard.
    pub async fn read_once(
        &self,
        job_id: JobId,
        cancel: &CancellationToken,
    ) -> Result<Option<Job>, OrchestratorError> {
        Ok(cancellable(cancel, job_id, self.store.get_job(job_id)).await??)
    }

    fn settle(&self, job: Job) -> Job {
        match job.status {
            JobStatus::Succeeded => self.guard.record_success(job.id),
            JobStatus::Failed => {
                self.guard.record_failure(job.id);
            }
            JobStatus::Queued | JobStatus::Running => {}
        }
        job
    }
}

/// Race `fut` against cancellation.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    job_id: JobId,
    fut: F,
) -> Result<F::Output, OrchestratorError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(%job_id, "polling cancelled");
            Err(OrchestratorError::Cancelled(job_id))
        }
        out = fut => Ok(out),
    }
}
