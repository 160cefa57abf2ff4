//! JobFinder - 既存ジョブの検索（重複投入の防止用）
//!
//! # 2 種類の検索
//! - **active**: 非終端（Queued / Running）のジョブ。作成の新しい順に最大 10 件を見る
//! - **recent**: 直近 `window` 以内に終端へ遷移したジョブ。更新の新しい順
//!
//! どちらも owner と kind で絞ったあと、入力が述語を満たす最初のジョブを返します。
//!
//! # 述語
//! - クロージャ（`Fn(&JobInput) -> bool`）はそのまま [`InputPredicate`]
//! - 構造化クエリは [`FieldMatch`]（payload の JSON 形に対して評価）

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{Job, JobInput, JobKind, JobStatus, OwnerId};
use crate::ports::{Clock, JobOrder, JobQuery, JobStore, StoreError};

/// How many candidates each lookup inspects.
pub const CANDIDATE_LIMIT: usize = 10;

/// Default trailing window for [`JobFinder::find_recent`].
pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(60);

/// Decides whether a job input is "the same request".
pub trait InputPredicate: Send + Sync {
    fn matches(&self, input: &JobInput) -> bool;
}

impl<F> InputPredicate for F
where
    F: Fn(&JobInput) -> bool + Send + Sync,
{
    fn matches(&self, input: &JobInput) -> bool {
        self(input)
    }
}

/// Accepts every input.
pub fn any_input(_: &JobInput) -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    Eq,
    Ne,
    /// String: substring. Array: contains the value (or every element of an array value).
    Contains,
    /// The field equals one of the elements of an array value.
    In,
}

/// One condition on a payload field.
///
/// `field` addresses the payload without its kind tag; nested fields use
/// dots (`"options.size"`). A missing field never matches, whatever the op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub field: String,
    pub op: MatchOp,
    pub value: Value,
}

impl FieldMatch {
    pub fn new(field: impl Into<String>, op: MatchOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, MatchOp::Eq, value)
    }

    pub fn field_ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, MatchOp::Ne, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, MatchOp::Contains, value)
    }

    pub fn is_in(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::new(field, MatchOp::In, values)
    }

    /// Conjunction of several conditions.
    pub fn all(matches: impl IntoIterator<Item = FieldMatch>) -> AllOf {
        AllOf(matches.into_iter().collect())
    }

    fn evaluate(&self, payload: &Value) -> bool {
        let pointer = format!("/{}", self.field.replace('.', "/"));
        let Some(actual) = payload.pointer(&pointer) else {
            return false;
        };
        match self.op {
            MatchOp::Eq => actual == &self.value,
            MatchOp::Ne => actual != &self.value,
            MatchOp::Contains => contains(actual, &self.value),
            MatchOp::In => self
                .value
                .as_array()
                .is_some_and(|candidates| candidates.contains(actual)),
        }
    }
}

fn contains(actual: &Value, needle: &Value) -> bool {
    match (actual, needle) {
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        (Value::Array(items), Value::Array(wanted)) => wanted.iter().all(|w| items.contains(w)),
        (Value::Array(items), single) => items.contains(single),
        _ => false,
    }
}

impl InputPredicate for FieldMatch {
    fn matches(&self, input: &JobInput) -> bool {
        self.evaluate(&input.payload_json())
    }
}

/// Every condition holds. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllOf(pub Vec<FieldMatch>);

impl InputPredicate for AllOf {
    fn matches(&self, input: &JobInput) -> bool {
        let payload = input.payload_json();
        self.0.iter().all(|m| m.evaluate(&payload))
    }
}

/// Looks up existing jobs of one owner and kind.
pub struct JobFinder<S, C> {
    store: S,
    clock: C,
}

impl<S: JobStore, C: Clock> JobFinder<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Most recently created non-terminal job whose input matches.
    pub async fn find_active<P: InputPredicate>(
        &self,
        owner: &OwnerId,
        kind: JobKind,
        predicate: P,
    ) -> Result<Option<Job>, StoreError> {
        let query = JobQuery::new(owner.clone(), kind)
            .with_statuses(&JobStatus::ACTIVE)
            .order_by(JobOrder::CreatedAt)
            .limit(CANDIDATE_LIMIT);
        let found = self.first_match(&query, &predicate).await?;
        debug!(%owner, %kind, found = ?found.as_ref().map(|j| j.id), "active job lookup");
        Ok(found)
    }

    /// Most recently updated terminal job that finished within `window`.
    pub async fn find_recent<P: InputPredicate>(
        &self,
        owner: &OwnerId,
        kind: JobKind,
        predicate: P,
        window: Duration,
    ) -> Result<Option<Job>, StoreError> {
        let mut query = JobQuery::new(owner.clone(), kind)
            .with_statuses(&JobStatus::TERMINAL)
            .order_by(JobOrder::UpdatedAt)
            .limit(CANDIDATE_LIMIT);
        // 範囲外の window は「制限なし」
        let since = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| self.clock.now().checked_sub_signed(w));
        if let Some(since) = since {
            query = query.updated_since(since);
        }
        let found = self.first_match(&query, &predicate).await?;
        debug!(
            %owner,
            %kind,
            window_ms = window.as_millis() as u64,
            found = ?found.as_ref().map(|j| j.id),
            "recent job lookup"
        );
        Ok(found)
    }

    async fn first_match<P: InputPredicate>(
        &self,
        query: &JobQuery,
        predicate: &P,
    ) -> Result<Option<Job>, StoreError> {
        let candidates = self.store.list_jobs(query).await?;
        Ok(candidates.into_iter().find(|job| predicate.matches(&job.input)))
    }
}
