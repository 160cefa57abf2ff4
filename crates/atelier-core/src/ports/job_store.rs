//! JobStore port - ジョブテーブルへのアクセス
//!
//! ジョブテーブルの正本はバックエンド側にあります。この crate は
//! create / get / list だけを使い、状態遷移は一切行いません（観測のみ）。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Job, JobId, JobInput, JobKind, JobStatus, OwnerId, TransitionError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or refused the request.
    #[error("job store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the query failed.
    #[error("job store query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Column used to order `list_jobs` results, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobOrder {
    #[default]
    CreatedAt,
    UpdatedAt,
}

/// Filter for `list_jobs`.
#[derive(Debug, Clone)]
pub struct JobQuery {
    pub owner: OwnerId,
    pub kind: JobKind,
    /// Empty means any status.
    pub statuses: Vec<JobStatus>,
    pub updated_since: Option<DateTime<Utc>>,
    pub order: JobOrder,
    pub limit: usize,
}

impl JobQuery {
    pub fn new(owner: OwnerId, kind: JobKind) -> Self {
        Self {
            owner,
            kind,
            statuses: Vec::new(),
            updated_since: None,
            order: JobOrder::CreatedAt,
            limit: 10,
        }
    }

    pub fn with_statuses(mut self, statuses: &[JobStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn updated_since(mut self, since: DateTime<Utc>) -> Self {
        self.updated_since = Some(since);
        self
    }

    pub fn order_by(mut self, order: JobOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Does `job` satisfy every filter (ignoring order/limit)?
    pub fn matches(&self, job: &Job) -> bool {
        job.owner == self.owner
            && job.kind() == self.kind
            && (self.statuses.is_empty() || self.statuses.contains(&job.status))
            && self.updated_since.is_none_or(|since| job.updated_at >= since)
    }
}

/// Job Record Accessor.
///
/// # 設計原則
/// - `create_job` は常に `Queued` のジョブを返す
/// - `get_job` はジョブが存在しなければ `Ok(None)`（エラーではない）
/// - `list_jobs` は `order` 列の降順（新しい順）で最大 `limit` 件
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, owner: &OwnerId, input: JobInput) -> Result<Job, StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError>;
}

#[async_trait]
impl<S: JobStore + ?Sized> JobStore for std::sync::Arc<S> {
    async fn create_job(&self, owner: &OwnerId, input: JobInput) -> Result<Job, StoreError> {
        (**self).create_job(owner, input).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        (**self).get_job(id).await
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        (**self).list_jobs(query).await
    }
}
