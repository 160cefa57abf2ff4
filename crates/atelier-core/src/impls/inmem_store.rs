//! InMemoryJobStore - 開発・テスト用のジョブテーブル
//!
//! # 学習ポイント
//! - `tokio::sync::RwLock` による async な排他制御
//! - Clock / IdGenerator の注入（決定的なテスト）
//! - executor 側の状態遷移（start / complete / fail）もここで再現する

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Job, JobId, JobInput, JobOutput, OwnerId};
use crate::ports::{
    Clock, IdGenerator, JobOrder, JobQuery, JobStore, StoreError, SystemClock, UlidGenerator,
};

/// In-memory job table.
///
/// Reads go through the [`JobStore`] port. The inherent `start`, `complete`
/// and `fail` methods play the external executor.
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            ids: Box::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
        }
    }

    /// Executor picked the job up: Queued -> Running.
    pub async fn start(&self, id: JobId) -> Result<Job, StoreError> {
        let now = self.clock.now();
        self.update(id, |job| job.start(now)).await
    }

    /// Executor finished the job with a result.
    pub async fn complete(&self, id: JobId, output: JobOutput) -> Result<Job, StoreError> {
        let now = self.clock.now();
        self.update(id, |job| job.succeed(output, now)).await
    }

    /// Executor gave up on the job.
    pub async fn fail(&self, id: JobId, message: impl Into<String>) -> Result<Job, StoreError> {
        let now = self.clock.now();
        let message = message.into();
        self.update(id, |job| job.fail(message, now)).await
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn update<F>(&self, id: JobId, apply: F) -> Result<Job, StoreError>
    where
        F: FnOnce(&mut Job) -> Result<(), crate::domain::TransitionError>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::Query(format!("job {id} does not exist")))?;
        apply(job)?;
        Ok(job.clone())
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, owner: &OwnerId, input: JobInput) -> Result<Job, StoreError> {
        let job = Job::new(self.ids.generate_job_id(), owner.clone(), input, self.clock.now());
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<Job> = jobs.values().filter(|j| query.matches(j)).cloned().collect();

        // 新しい順。同時刻は id（ULID）で安定化
        match query.order {
            JobOrder::CreatedAt => {
                matched.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)))
            }
            JobOrder::UpdatedAt => {
                matched.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)))
            }
        }
        matched.truncate(query.limit);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AutoTagInput, AutoTagOutput, JobKind, JobStatus, ProductShotInput};
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone, Utc};

    fn auto_tag(item: &str) -> JobInput {
        JobInput::AutoTag(AutoTagInput {
            item_id: item.to_string(),
            image_url: format!("https://cdn.example/{item}.png"),
        })
    }

    #[tokio::test]
    async fn created_jobs_are_queued_and_readable() {
        let store = InMemoryJobStore::new();
        let owner = OwnerId::new("u1");

        let job = store.create_job(&owner, auto_tag("x")).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let read = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(read, job);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn missing_job_reads_as_none() {
        let store = InMemoryJobStore::new();
        let id = JobId::from_ulid(ulid::Ulid::new());
        assert!(store.get_job(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn executor_transitions_are_validated() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(&OwnerId::new("u1"), auto_tag("x")).await.unwrap();

        store.start(job.id).await.unwrap();
        let done = store
            .complete(
                job.id,
                JobOutput::AutoTag(AutoTagOutput {
                    tags: vec!["red".to_string()],
                    category: None,
                    colors: vec![],
                }),
            )
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);

        assert!(matches!(
            store.fail(job.id, "late failure").await,
            Err(StoreError::Transition(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let store = InMemoryJobStore::with_clock(clock.clone());
        let owner = OwnerId::new("u1");

        let first = store.create_job(&owner, auto_tag("a")).await.unwrap();
        clock.advance(Duration::seconds(1));
        let second = store.create_job(&owner, auto_tag("b")).await.unwrap();
        clock.advance(Duration::seconds(1));
        store.create_job(&OwnerId::new("u2"), auto_tag("c")).await.unwrap();
        store
            .create_job(
                &owner,
                JobInput::ProductShot(ProductShotInput {
                    item_id: "d".to_string(),
                    image_url: "https://cdn.example/d.png".to_string(),
                    background: None,
                }),
            )
            .await
            .unwrap();

        let query = JobQuery::new(owner.clone(), JobKind::AutoTag);
        let ids: Vec<JobId> = store.list_jobs(&query).await.unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let limited = store.list_jobs(&query.clone().limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);

        // first を後から更新すると updated_at 順では先頭に来る
        clock.advance(Duration::seconds(5));
        store.start(first.id).await.unwrap();
        let by_update = store
            .list_jobs(&query.order_by(JobOrder::UpdatedAt))
            .await
            .unwrap();
        assert_eq!(by_update[0].id, first.id);
    }
}
