use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use atelier_core::domain::{
    AutoTagInput, AutoTagOutput, BatchOutput, FailureClass, ImageOutput, Job, JobId, JobInput,
    JobKind, JobOutput, JobStatus, OwnerId, classify_failure,
};
use atelier_core::impls::InMemoryJobStore;
use atelier_core::observability::JobCounts;
use atelier_core::ports::{ExecutionTrigger, JobStore, TriggerOutcome};
use atelier_core::{Orchestrator, OrchestratorError, SubmitOrReuse, WaitOptions, init_tracing};

/// executor 役：trigger を受けたらバックグラウンドでジョブを進める
struct SimulatedExecutor {
    store: Arc<InMemoryJobStore>,
    work: Duration,
    /// この回数だけ trigger を取りこぼす（at-most-once 配送の再現）
    remaining_drops: AtomicU32,
}

impl SimulatedExecutor {
    fn new(store: Arc<InMemoryJobStore>, work: Duration, drops: u32) -> Self {
        Self {
            store,
            work,
            remaining_drops: AtomicU32::new(drops),
        }
    }
}

#[async_trait]
impl ExecutionTrigger for SimulatedExecutor {
    async fn trigger(&self, job_id: JobId) -> Result<TriggerOutcome, OrchestratorError> {
        let left = self.remaining_drops.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_drops.fetch_sub(1, Ordering::Relaxed);
            return Err(OrchestratorError::Transport {
                status: Some(503),
                message: format!("intentional drop (left={left})"),
            });
        }

        let store = self.store.clone();
        let work = self.work;
        tokio::spawn(async move {
            if let Err(e) = run_job(&store, job_id, work).await {
                warn!(%job_id, error = %e, "simulated executor failed");
            }
        });
        Ok(TriggerOutcome::Accepted)
    }
}

async fn run_job(
    store: &InMemoryJobStore,
    job_id: JobId,
    work: Duration,
) -> Result<(), OrchestratorError> {
    let Some(job) = store.get_job(job_id).await? else {
        return Err(OrchestratorError::JobNotFound(job_id));
    };
    store.start(job_id).await?;
    sleep(work).await;

    match &job.input {
        JobInput::ProductShot(p) if p.background.as_deref() == Some("neon") => {
            store
                .fail(job_id, "Request blocked by content policy")
                .await?;
        }
        input => {
            store.complete(job_id, fake_output(input)).await?;
        }
    }
    Ok(())
}

fn fake_output(input: &JobInput) -> JobOutput {
    match input {
        JobInput::AutoTag(_) => JobOutput::AutoTag(AutoTagOutput {
            tags: vec!["denim".to_string(), "casual".to_string()],
            category: Some("outerwear".to_string()),
            colors: vec!["indigo".to_string()],
        }),
        JobInput::ProductShot(p) => JobOutput::ProductShot(ImageOutput {
            image_url: format!("https://cdn.example/shots/{}.png", p.item_id),
        }),
        JobInput::HeadshotGenerate(_) => JobOutput::HeadshotGenerate(ImageOutput {
            image_url: "https://cdn.example/headshots/latest.png".to_string(),
        }),
        JobInput::OutfitRender(o) => JobOutput::OutfitRender(ImageOutput {
            image_url: format!("https://cdn.example/renders/{}.png", o.outfit_id),
        }),
        JobInput::OutfitMannequin(o) => JobOutput::OutfitMannequin(ImageOutput {
            image_url: format!("https://cdn.example/mannequins/{}.png", o.outfit_id),
        }),
        JobInput::Batch(b) => JobOutput::Batch(BatchOutput {
            succeeded: b.item_ids.clone(),
            failed: vec![],
        }),
    }
}

#[derive(Debug, Serialize)]
struct JobReport {
    job_id: String,
    kind: JobKind,
    status: JobStatus,
    result: Option<JobOutput>,
    error: Option<String>,
    failure: Option<FailureClass>,
}

impl From<&Job> for JobReport {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            kind: job.kind(),
            status: job.status,
            result: job.result.clone(),
            error: job.error.clone(),
            failure: classify_failure(job),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), OrchestratorError> {
    init_tracing();

    // (A) ジョブテーブルと executor 役を用意（最初の trigger は取りこぼす）
    let store = Arc::new(InMemoryJobStore::new());
    let executor = SimulatedExecutor::new(store.clone(), Duration::from_millis(1200), 1);
    let orchestrator = Orchestrator::new(store.clone(), executor);
    let owner = OwnerId::new("demo-user");
    let cancel = CancellationToken::new();

    // (B) 投入。1 件目は trigger が落ちるが、ジョブ自体は作成済み
    let dropped = orchestrator
        .submit_auto_tag(&owner, "jacket-1", "https://cdn.example/items/jacket-1.png")
        .await?;
    if let Some(e) = &dropped.trigger_error {
        warn!(job_id = %dropped.job_id(), error = %e, "trigger failed, job stays queued");
    }

    let tagged = orchestrator
        .submit_auto_tag(&owner, "jeans-2", "https://cdn.example/items/jeans-2.png")
        .await?;
    let blocked = orchestrator
        .submit_product_shot(
            &owner,
            "jeans-2",
            "https://cdn.example/items/jeans-2.png",
            Some("neon".to_string()),
        )
        .await?;
    let mannequin = orchestrator
        .submit_outfit_mannequin(&owner, "look-7", vec!["jacket-1".into(), "jeans-2".into()])
        .await?;

    // (C) 同じ依頼をもう一度：既存ジョブが再利用される
    let duplicate = orchestrator
        .submit_or_reuse(
            &owner,
            JobInput::AutoTag(AutoTagInput {
                item_id: "jeans-2".to_string(),
                image_url: "https://cdn.example/items/jeans-2.png".to_string(),
            }),
        )
        .await?;
    info!(job_id = %duplicate.job_id(), reused = duplicate.is_reused(), "duplicate request");
    if let SubmitOrReuse::Created(_) = duplicate {
        warn!("duplicate request was not debounced");
    }

    // (D) 完了待ち
    let options = WaitOptions::default();
    let mut finished = Vec::new();
    for id in [tagged.job_id(), blocked.job_id(), mannequin.job_id()] {
        finished.push(orchestrator.wait_for_completion(id, &options, &cancel).await?);
    }

    // trigger を落としたジョブは短い待ちでタイムアウトする
    let short = WaitOptions::new(2, Duration::from_millis(500));
    match orchestrator
        .wait_for_completion(dropped.job_id(), &short, &cancel)
        .await
    {
        Err(e @ OrchestratorError::PollingTimeout { .. }) => info!(error = %e, "as expected"),
        other => warn!(?other, "unexpected wait result for dropped job"),
    }
    if let Some(job) = store.get_job(dropped.job_id()).await? {
        finished.push(job);
    }

    // (E) 結果
    let reports: Vec<JobReport> = finished.iter().map(JobReport::from).collect();
    println!("{}", to_json(&reports));
    println!("{}", to_json(&JobCounts::from_jobs(&finished)));
    println!("{}", to_json(&orchestrator.guard_snapshot()));

    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}
