//! Orchestrator - 投入・起動・完了待ちの窓口
//!
//! # フロー
//! caller → create（ジョブテーブル）→ trigger（executor へ通知）→ poll（guard 経由）→ 終端ジョブ
//!
//! # 設計原則
//! - trigger は best-effort。失敗しても作成済みのジョブは巻き戻さない
//! - 完了は必ずポーリングで確認する（trigger の成功は実行の保証ではない）
//! - `Failed` は正常な終端結果としてデータで返す

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{PollerConfig, WaitOptions};
use super::finder::{DEFAULT_RECENT_WINDOW, InputPredicate, JobFinder};
use super::guard::{GuardSnapshot, PollingGuard};
use super::poller::{Poller, cancellable};
use crate::domain::{
    AutoTagInput, BatchInput, HeadshotInput, Job, JobId, JobInput, JobKind, OutfitMannequinInput,
    OutfitRenderInput, OwnerId, ProductShotInput,
};
use crate::error::OrchestratorError;
use crate::ports::{Clock, ExecutionTrigger, JobStore, SystemClock, TriggerOutcome};

/// A created job and what happened when the executor was notified.
#[derive(Debug)]
pub struct Submission {
    pub job: Job,
    pub outcome: Option<TriggerOutcome>,
    /// The notification failed. The job exists regardless.
    pub trigger_error: Option<OrchestratorError>,
}

impl Submission {
    pub fn job_id(&self) -> JobId {
        self.job.id
    }

    pub fn is_triggered(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Result of [`Orchestrator::submit_or_reuse`].
#[derive(Debug)]
pub enum SubmitOrReuse {
    Created(Submission),
    /// An identical request is still queued or running.
    Active(Job),
    /// An identical request finished within the recent window.
    Recent(Job),
}

impl SubmitOrReuse {
    pub fn job_id(&self) -> JobId {
        match self {
            SubmitOrReuse::Created(s) => s.job_id(),
            SubmitOrReuse::Active(job) | SubmitOrReuse::Recent(job) => job.id,
        }
    }

    pub fn is_reused(&self) -> bool {
        !matches!(self, SubmitOrReuse::Created(_))
    }
}

pub struct Orchestrator<S, T> {
    store: Arc<S>,
    trigger: T,
    poller: Poller<Arc<S>>,
    finder: JobFinder<Arc<S>, Arc<dyn Clock>>,
    recent_window: Duration,
}

impl<S: JobStore, T: ExecutionTrigger> Orchestrator<S, T> {
    /// Orchestrator with default poller settings and the system clock.
    pub fn new(store: Arc<S>, trigger: T) -> Self {
        Self::from_parts(
            store,
            trigger,
            Arc::new(SystemClock),
            PollerConfig::default(),
            DEFAULT_RECENT_WINDOW,
        )
    }

    pub(crate) fn from_parts(
        store: Arc<S>,
        trigger: T,
        clock: Arc<dyn Clock>,
        config: PollerConfig,
        recent_window: Duration,
    ) -> Self {
        let guard = Arc::new(PollingGuard::new(config.failure_threshold));
        Self {
            poller: Poller::new(Arc::clone(&store), guard, config),
            finder: JobFinder::new(Arc::clone(&store), clock),
            store,
            trigger,
            recent_window,
        }
    }

    pub fn guard(&self) -> &Arc<PollingGuard> {
        self.poller.guard()
    }

    // ========================================
    // Submission
    // ========================================

    /// Create the job, then notify the executor.
    ///
    /// Store failures propagate. A failed notification is reported in
    /// [`Submission::trigger_error`] and does not undo the creation.
    pub async fn create_and_trigger(
        &self,
        owner: &OwnerId,
        input: JobInput,
    ) -> Result<Submission, OrchestratorError> {
        let job = self.store.create_job(owner, input).await?;
        info!(job_id = %job.id, kind = %job.kind(), %owner, "job created");

        let (outcome, trigger_error) = match self.trigger.trigger(job.id).await {
            Ok(outcome) => {
                debug!(job_id = %job.id, ?outcome, "executor notified");
                (Some(outcome), None)
            }
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    error = %e,
                    "executor notification failed, job left queued"
                );
                (None, Some(e))
            }
        };
        Ok(Submission {
            job,
            outcome,
            trigger_error,
        })
    }

    /// Reuse an identical active or recently finished job, else submit.
    pub async fn submit_or_reuse(
        &self,
        owner: &OwnerId,
        input: JobInput,
    ) -> Result<SubmitOrReuse, OrchestratorError> {
        let kind = input.kind();
        let same = |candidate: &JobInput| candidate == &input;

        if let Some(job) = self.finder.find_active(owner, kind, &same).await? {
            info!(job_id = %job.id, %kind, "reusing active job");
            return Ok(SubmitOrReuse::Active(job));
        }
        if let Some(job) = self
            .finder
            .find_recent(owner, kind, &same, self.recent_window)
            .await?
        {
            info!(job_id = %job.id, %kind, "reusing recent job");
            return Ok(SubmitOrReuse::Recent(job));
        }
        Ok(SubmitOrReuse::Created(self.create_and_trigger(owner, input).await?))
    }

    pub async fn submit_auto_tag(
        &self,
        owner: &OwnerId,
        item_id: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Result<Submission, OrchestratorError> {
        let input = JobInput::AutoTag(AutoTagInput {
            item_id: item_id.into(),
            image_url: image_url.into(),
        });
        self.create_and_trigger(owner, input).await
    }

    pub async fn submit_product_shot(
        &self,
        owner: &OwnerId,
        item_id: impl Into<String>,
        image_url: impl Into<String>,
        background: Option<String>,
    ) -> Result<Submission, OrchestratorError> {
        let input = JobInput::ProductShot(ProductShotInput {
            item_id: item_id.into(),
            image_url: image_url.into(),
            background,
        });
        self.create_and_trigger(owner, input).await
    }

    pub async fn submit_headshot(
        &self,
        owner: &OwnerId,
        source_image_urls: Vec<String>,
        style: Option<String>,
    ) -> Result<Submission, OrchestratorError> {
        let input = JobInput::HeadshotGenerate(HeadshotInput {
            source_image_urls,
            style,
        });
        self.create_and_trigger(owner, input).await
    }

    pub async fn submit_outfit_render(
        &self,
        owner: &OwnerId,
        outfit_id: impl Into<String>,
        item_ids: Vec<String>,
        headshot_url: impl Into<String>,
    ) -> Result<Submission, OrchestratorError> {
        let input = JobInput::OutfitRender(OutfitRenderInput {
            outfit_id: outfit_id.into(),
            item_ids,
            headshot_url: headshot_url.into(),
        });
        self.create_and_trigger(owner, input).await
    }

    pub async fn submit_outfit_mannequin(
        &self,
        owner: &OwnerId,
        outfit_id: impl Into<String>,
        item_ids: Vec<String>,
    ) -> Result<Submission, OrchestratorError> {
        let input = JobInput::OutfitMannequin(OutfitMannequinInput {
            outfit_id: outfit_id.into(),
            item_ids,
        });
        self.create_and_trigger(owner, input).await
    }

    pub async fn submit_batch(
        &self,
        owner: &OwnerId,
        operation: JobKind,
        item_ids: Vec<String>,
    ) -> Result<Submission, OrchestratorError> {
        let input = JobInput::Batch(BatchInput {
            operation,
            item_ids,
        });
        self.create_and_trigger(owner, input).await
    }

    // ========================================
    // Polling
    // ========================================

    pub async fn poll_job(
        &self,
        job_id: JobId,
        max_attempts: u32,
        initial_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        self.poller
            .poll_with_backoff(job_id, max_attempts, initial_interval, cancel)
            .await
    }

    pub async fn poll_job_fixed_interval(
        &self,
        job_id: JobId,
        max_duration: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        self.poller
            .poll_fixed_interval(job_id, max_duration, interval, cancel)
            .await
    }

    pub async fn poll_job_with_final_check(
        &self,
        job_id: JobId,
        max_attempts: u32,
        initial_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        self.poller
            .poll_with_final_check(job_id, max_attempts, initial_interval, cancel)
            .await
    }

    /// Wait for a job to become terminal, whoever triggered it.
    ///
    /// Short initial intervals use the fixed-interval strategy followed by
    /// one direct read. Longer ones use backoff with a final check and are
    /// restarted after a pause on every timeout, until a terminal job, any
    /// other error, or `options.deadline`.
    pub async fn wait_for_completion(
        &self,
        job_id: JobId,
        options: &WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        if options.uses_fixed_interval() {
            self.wait_fixed_interval(job_id, options, cancel).await
        } else {
            self.wait_with_restarts(job_id, options, cancel).await
        }
    }

    async fn wait_fixed_interval(
        &self,
        job_id: JobId,
        options: &WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        let duration = options.fixed_duration();
        debug!(%job_id, duration_ms = duration.as_millis() as u64, "waiting with fixed interval");

        match self
            .poller
            .poll_fixed_interval(job_id, duration, options.fixed_interval, cancel)
            .await
        {
            Err(timeout @ OrchestratorError::PollingTimeout { .. }) => {
                match self.poller.read_once(job_id, cancel).await? {
                    Some(job) if job.is_terminal() => {
                        info!(
                            %job_id,
                            status = ?job.status,
                            "job finished right after fixed-interval timeout"
                        );
                        Ok(job)
                    }
                    _ => Err(timeout),
                }
            }
            other => other,
        }
    }

    async fn wait_with_restarts(
        &self,
        job_id: JobId,
        options: &WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<Job, OrchestratorError> {
        let started = Instant::now();
        let mut round = 1u32;

        loop {
            let remaining = match options.deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_sub(started.elapsed());
                    if remaining.is_zero() {
                        return Err(deadline_exceeded(job_id, started));
                    }
                    Some(remaining)
                }
                None => None,
            };

            let poll = self.poller.poll_with_final_check(
                job_id,
                options.max_attempts,
                options.initial_interval,
                cancel,
            );
            let outcome = match remaining {
                Some(remaining) => match timeout(remaining, poll).await {
                    Ok(outcome) => outcome,
                    Err(_) => return Err(deadline_exceeded(job_id, started)),
                },
                None => poll.await,
            };

            match outcome {
                Err(OrchestratorError::PollingTimeout { .. }) => {
                    let pause = match options.deadline {
                        Some(deadline) => options
                            .restart_delay
                            .min(deadline.saturating_sub(started.elapsed())),
                        None => options.restart_delay,
                    };
                    round += 1;
                    info!(
                        %job_id,
                        round,
                        pause_ms = pause.as_millis() as u64,
                        "poll timed out, restarting"
                    );
                    cancellable(cancel, job_id, sleep(pause)).await?;
                }
                other => return other,
            }
        }
    }

    // ========================================
    // Guard
    // ========================================

    pub fn reset_circuit_breaker(&self, job_id: JobId) {
        self.guard().reset_circuit_breaker(job_id);
    }

    pub fn is_circuit_breaker_open(&self, job_id: JobId) -> bool {
        self.guard().is_circuit_breaker_open(job_id)
    }

    pub fn guard_snapshot(&self) -> GuardSnapshot {
        self.guard().snapshot()
    }

    // ========================================
    // Lookup
    // ========================================

    pub async fn active_job<P: InputPredicate>(
        &self,
        owner: &OwnerId,
        kind: JobKind,
        predicate: P,
    ) -> Result<Option<Job>, OrchestratorError> {
        Ok(self.finder.find_active(owner, kind, predicate).await?)
    }

    /// Terminal job finished within the configured recent window.
    pub async fn recent_job<P: InputPredicate>(
        &self,
        owner: &OwnerId,
        kind: JobKind,
        predicate: P,
    ) -> Result<Option<Job>, OrchestratorError> {
        self.recent_job_within(owner, kind, predicate, self.recent_window)
            .await
    }

    pub async fn recent_job_within<P: InputPredicate>(
        &self,
        owner: &OwnerId,
        kind: JobKind,
        predicate: P,
        window: Duration,
    ) -> Result<Option<Job>, OrchestratorError> {
        Ok(self.finder.find_recent(owner, kind, predicate, window).await?)
    }
}

fn deadline_exceeded(job_id: JobId, started: Instant) -> OrchestratorError {
    let elapsed = started.elapsed();
    warn!(%job_id, ?elapsed, "gave up waiting for job");
    OrchestratorError::PollingTimeout { job_id, elapsed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureClass, JobStatus, classify_failure};
    use crate::impls::InMemoryJobStore;
    use crate::testing::{ProbeStore, RecordingTrigger, auto_tag, red_tags};
    use rstest::rstest;

    type TestOrchestrator = Orchestrator<ProbeStore, Arc<RecordingTrigger>>;

    fn orchestrator(trigger: Arc<RecordingTrigger>) -> (Arc<ProbeStore>, TestOrchestrator) {
        let store = ProbeStore::new();
        (store.clone(), Orchestrator::new(store, trigger))
    }

    fn owner() -> OwnerId {
        OwnerId::new("u1")
    }

    #[tokio::test]
    async fn create_and_trigger_notifies_executor() {
        let trigger = RecordingTrigger::accepting();
        let (store, orch) = orchestrator(trigger.clone());

        let submission = orch.create_and_trigger(&owner(), auto_tag("x")).await.unwrap();
        assert_eq!(submission.job.status, JobStatus::Queued);
        assert_eq!(submission.outcome, Some(TriggerOutcome::Accepted));
        assert!(submission.trigger_error.is_none());
        assert_eq!(trigger.calls(), vec![submission.job_id()]);
        assert_eq!(store.inner.len().await, 1);
    }

    #[tokio::test]
    async fn trigger_failure_keeps_created_job() {
        let (store, orch) = orchestrator(RecordingTrigger::failing(500));

        let submission = orch.create_and_trigger(&owner(), auto_tag("x")).await.unwrap();
        assert!(!submission.is_triggered());
        assert!(matches!(
            submission.trigger_error,
            Some(OrchestratorError::Transport { status: Some(500), .. })
        ));
        let stored = store.inner.get_job(submission.job_id()).await.unwrap();
        assert_eq!(stored.map(|j| j.status), Some(JobStatus::Queued));
    }

    #[rstest]
    #[case::auto_tag(JobKind::AutoTag)]
    #[case::product_shot(JobKind::ProductShot)]
    #[case::headshot(JobKind::HeadshotGenerate)]
    #[case::outfit_render(JobKind::OutfitRender)]
    #[case::outfit_mannequin(JobKind::OutfitMannequin)]
    #[case::batch(JobKind::Batch)]
    #[tokio::test]
    async fn per_kind_submitters_shape_input(#[case] kind: JobKind) {
        let (_store, orch) = orchestrator(RecordingTrigger::accepting());
        let o = owner();
        let items = vec!["i1".to_string(), "i2".to_string()];

        let submission = match kind {
            JobKind::AutoTag => orch.submit_auto_tag(&o, "i1", "https://cdn.example/i1.png").await,
            JobKind::ProductShot => {
                orch.submit_product_shot(&o, "i1", "https://cdn.example/i1.png", None)
                    .await
            }
            JobKind::HeadshotGenerate => {
                orch.submit_headshot(&o, vec!["https://cdn.example/s.png".into()], None)
                    .await
            }
            JobKind::OutfitRender => {
                orch.submit_outfit_render(&o, "o1", items, "https://cdn.example/h.png")
                    .await
            }
            JobKind::OutfitMannequin => orch.submit_outfit_mannequin(&o, "o1", items).await,
            JobKind::Batch => orch.submit_batch(&o, JobKind::AutoTag, items).await,
        }
        .unwrap();

        assert_eq!(submission.job.kind(), kind);
        assert_eq!(submission.job.owner, o);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_tag_round_trip_through_default_wait() {
        let store = Arc::new(InMemoryJobStore::new());
        let trigger = RecordingTrigger::completing(store.clone(), Duration::from_secs(3));
        let orch = Orchestrator::new(store, trigger);

        let submission = orch
            .submit_auto_tag(&owner(), "x", "https://cdn.example/x.png")
            .await
            .unwrap();
        let done = orch
            .wait_for_completion(
                submission.job_id(),
                &WaitOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.result, Some(red_tags()));
        assert!(classify_failure(&done).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_interval_wait_does_one_last_read() {
        let (store, orch) = orchestrator(RecordingTrigger::accepting());
        let job = store.create("x").await;
        store.inner.complete(job.id, red_tags()).await.unwrap();
        // reads at 0, 1.5, 3, 4.5, 6, 7.5, 9 see the old state
        store.set_stale_reads(7);

        let options = WaitOptions::new(10, Duration::from_secs(1));
        let done = orch
            .wait_for_completion(job.id, &options, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(store.reads(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_wait_restarts_after_timeouts() {
        let (store, orch) = orchestrator(RecordingTrigger::accepting());
        let job = store.create("x").await;
        let inner = store.inner.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(9)).await;
            inner.complete(job.id, red_tags()).await.unwrap();
        });

        // round 1: reads 0s, 3s + final check; pause 2s
        // round 2: reads 5s, 8s + final check; pause 2s
        // round 3: read 10s sees the result
        let options = WaitOptions::new(2, Duration::from_secs(3));
        let started = Instant::now();
        let done = orch
            .wait_for_completion(job.id, &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(store.reads(), 7);
        assert_eq!(orch.guard().failure_count(job.id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_wait_stops_at_deadline() {
        let (store, orch) = orchestrator(RecordingTrigger::accepting());
        let job = store.create("x").await;

        let options = WaitOptions::new(2, Duration::from_secs(3))
            .with_deadline(Some(Duration::from_secs(12)));
        let err = orch
            .wait_for_completion(job.id, &options, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            OrchestratorError::PollingTimeout { job_id, elapsed } => {
                assert_eq!(job_id, job.id);
                assert_eq!(elapsed, Duration::from_secs(12));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!orch.guard().is_polling(job.id));
        assert_eq!(orch.guard().failure_count(job.id), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_wait_ends_when_breaker_opens() {
        let (store, orch) = orchestrator(RecordingTrigger::accepting());
        let job = store.create("x").await;

        let options = WaitOptions::new(2, Duration::from_secs(3)).with_deadline(None);
        let err = orch
            .wait_for_completion(job.id, &options, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::CircuitBreakerOpen(id) if id == job.id));
        assert!(orch.is_circuit_breaker_open(job.id));
        // five rounds of two reads plus a final check each
        assert_eq!(store.reads(), 15);
        assert_eq!(orch.guard_snapshot().open_breakers, 1);

        orch.reset_circuit_breaker(job.id);
        assert!(!orch.is_circuit_breaker_open(job.id));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_is_cancellable() {
        let (store, orch) = orchestrator(RecordingTrigger::accepting());
        let job = store.create("x").await;
        let orch = Arc::new(orch);
        let cancel = CancellationToken::new();

        let handle = {
            let orch = orch.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let options = WaitOptions::new(30, Duration::from_secs(5));
                orch.wait_for_completion(job.id, &options, &cancel).await
            })
        };
        sleep(Duration::from_secs(7)).await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(OrchestratorError::Cancelled(_))));
        assert!(!orch.guard().is_polling(job.id));
    }

    #[tokio::test]
    async fn failed_job_is_classified_not_raised() {
        let (store, orch) = orchestrator(RecordingTrigger::accepting());
        let job = store.create("x").await;
        store
            .inner
            .fail(job.id, "Request blocked by content policy")
            .await
            .unwrap();

        let failed = orch
            .poll_job(job.id, 3, Duration::from_millis(10), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(classify_failure(&failed), Some(FailureClass::PolicyBlock));
    }

    #[tokio::test]
    async fn submit_or_reuse_debounces_identical_requests() {
        let trigger = RecordingTrigger::accepting();
        let (store, orch) = orchestrator(trigger.clone());
        let o = owner();

        let first = orch.submit_or_reuse(&o, auto_tag("x")).await.unwrap();
        assert!(!first.is_reused());

        let again = orch.submit_or_reuse(&o, auto_tag("x")).await.unwrap();
        assert!(matches!(again, SubmitOrReuse::Active(ref j) if j.id == first.job_id()));

        store.inner.complete(first.job_id(), red_tags()).await.unwrap();
        let after = orch.submit_or_reuse(&o, auto_tag("x")).await.unwrap();
        assert!(matches!(after, SubmitOrReuse::Recent(ref j) if j.id == first.job_id()));

        let other = orch.submit_or_reuse(&o, auto_tag("y")).await.unwrap();
        assert!(matches!(other, SubmitOrReuse::Created(_)));
        assert_eq!(trigger.calls().len(), 2);
    }

    #[tokio::test]
    async fn lookups_delegate_to_finder() {
        let (store, orch) = orchestrator(RecordingTrigger::accepting());
        let job = store.create("x").await;

        let active = orch
            .active_job(&owner(), JobKind::AutoTag, |i: &JobInput| i == &auto_tag("x"))
            .await
            .unwrap();
        assert_eq!(active.map(|j| j.id), Some(job.id));

        store.inner.complete(job.id, red_tags()).await.unwrap();
        let recent = orch
            .recent_job(&owner(), JobKind::AutoTag, |_: &JobInput| true)
            .await
            .unwrap();
        assert_eq!(recent.map(|j| j.id), Some(job.id));
    }
}
