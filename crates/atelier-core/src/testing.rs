//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    AutoTagInput, AutoTagOutput, Job, JobId, JobInput, JobOutput, JobStatus, OwnerId,
};
use crate::error::OrchestratorError;
use crate::impls::InMemoryJobStore;
use crate::ports::{ExecutionTrigger, JobQuery, JobStore, StoreError, TriggerOutcome};

pub fn auto_tag(item: &str) -> JobInput {
    JobInput::AutoTag(AutoTagInput {
        item_id: item.to_string(),
        image_url: format!("https://cdn.example/{item}.png"),
    })
}

pub fn red_tags() -> JobOutput {
    JobOutput::AutoTag(AutoTagOutput {
        tags: vec!["red".to_string()],
        category: None,
        colors: vec![],
    })
}

/// Wraps an in-memory store, counts `get_job` calls and can be told to fail reads.
pub struct ProbeStore {
    pub inner: Arc<InMemoryJobStore>,
    reads: AtomicUsize,
    failing: AtomicBool,
    stale_reads: AtomicUsize,
}

impl ProbeStore {
    pub fn new() -> Arc<Self> {
        Self::wrap(Arc::new(InMemoryJobStore::new()))
    }

    pub fn wrap(inner: Arc<InMemoryJobStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reads: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            stale_reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The next `n` reads report terminal jobs as still running (replica lag).
    pub fn set_stale_reads(&self, n: usize) {
        self.stale_reads.store(n, Ordering::SeqCst);
    }

    pub async fn create(&self, item: &str) -> Job {
        self.inner
            .create_job(&OwnerId::new("u1"), auto_tag(item))
            .await
            .expect("in-memory create never fails")
    }
}

#[async_trait]
impl JobStore for ProbeStore {
    async fn create_job(&self, owner: &OwnerId, input: JobInput) -> Result<Job, StoreError> {
        self.inner.create_job(owner, input).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        let mut job = self.inner.get_job(id).await?;
        let stale = self
            .stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale && let Some(job) = job.as_mut().filter(|j| j.is_terminal()) {
            job.status = JobStatus::Running;
            job.result = None;
            job.error = None;
        }
        Ok(job)
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        self.inner.list_jobs(query).await
    }
}

/// Records trigger calls. Optionally fails, or plays the executor by
/// completing the job after a delay.
pub struct RecordingTrigger {
    calls: Mutex<Vec<JobId>>,
    fail_status: Option<u16>,
    executor: Option<(Arc<InMemoryJobStore>, Duration)>,
}

impl RecordingTrigger {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_status: None,
            executor: None,
        })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_status: Some(status),
            executor: None,
        })
    }

    /// Starts the job right away and completes it with [`red_tags`] after `delay`.
    pub fn completing(store: Arc<InMemoryJobStore>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_status: None,
            executor: Some((store, delay)),
        })
    }

    pub fn calls(&self) -> Vec<JobId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionTrigger for RecordingTrigger {
    async fn trigger(&self, job_id: JobId) -> Result<TriggerOutcome, OrchestratorError> {
        self.calls.lock().unwrap().push(job_id);
        if let Some(status) = self.fail_status {
            return Err(OrchestratorError::Transport {
                status: Some(status),
                message: "executor unavailable".to_string(),
            });
        }
        if let Some((store, delay)) = &self.executor {
            let store = store.clone();
            let delay = *delay;
            tokio::spawn(async move {
                store.start(job_id).await.unwrap();
                tokio::time::sleep(delay).await;
                store.complete(job_id, red_tags()).await.unwrap();
            });
        }
        Ok(TriggerOutcome::Accepted)
    }
}
