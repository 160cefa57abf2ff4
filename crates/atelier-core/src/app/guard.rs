//! PollingGuard - ポーリングの重複防止とサーキットブレーカー
//!
//! # 状態
//! - active: 現在ポーリング中の job id と、その permit の世代番号（acquire/release）
//! - failures: job id ごとの連続失敗回数
//!
//! どちらも advisory な状態（best-effort の重複排除）で、プロセス内のみ・非永続。
//! orchestrator インスタンスごとに 1 つ作り、`Arc` で poller と共有します。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::JobId;
use crate::error::OrchestratorError;

#[derive(Debug, Default)]
struct GuardState {
    /// job id -> generation of the permit that owns it
    active: HashMap<JobId, u64>,
    failures: HashMap<JobId, u32>,
    next_generation: u64,
}

/// Point-in-time view of the guard, for status endpoints and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuardSnapshot {
    pub active_polls: usize,
    pub tracked_failures: usize,
    pub open_breakers: usize,
}

#[derive(Debug)]
pub struct PollingGuard {
    state: Mutex<GuardState>,
    failure_threshold: u32,
}

impl PollingGuard {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            state: Mutex::new(GuardState::default()),
            failure_threshold,
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Circuit breaker check, then dedup. The returned permit releases the
    /// job id when dropped.
    pub fn start_polling(self: &Arc<Self>, job_id: JobId) -> Result<PollPermit, OrchestratorError> {
        let mut state = self.lock();
        let failures = state.failures.get(&job_id).copied().unwrap_or(0);
        if failures >= self.failure_threshold {
            warn!(%job_id, failures, "circuit breaker open, refusing to poll");
            return Err(OrchestratorError::CircuitBreakerOpen(job_id));
        }
        self.insert_active(&mut state, job_id)
    }

    /// Dedup only; the circuit breaker is not consulted.
    pub fn claim(self: &Arc<Self>, job_id: JobId) -> Result<PollPermit, OrchestratorError> {
        let mut state = self.lock();
        self.insert_active(&mut state, job_id)
    }

    fn insert_active(
        self: &Arc<Self>,
        state: &mut GuardState,
        job_id: JobId,
    ) -> Result<PollPermit, OrchestratorError> {
        if state.active.contains_key(&job_id) {
            debug!(%job_id, "job is already being polled");
            return Err(OrchestratorError::AlreadyPolling(job_id));
        }
        state.next_generation += 1;
        let generation = state.next_generation;
        state.active.insert(job_id, generation);
        Ok(PollPermit {
            guard: Arc::clone(self),
            job_id,
            generation,
        })
    }

    /// Count one more consecutive failure. Returns the new count.
    pub fn record_failure(&self, job_id: JobId) -> u32 {
        let mut state = self.lock();
        let count = state.failures.entry(job_id).or_insert(0);
        *count += 1;
        let count = *count;
        if count == self.failure_threshold {
            warn!(%job_id, failures = count, "circuit breaker tripped");
        }
        count
    }

    pub fn record_success(&self, job_id: JobId) {
        self.lock().failures.remove(&job_id);
    }

    /// Clear the failure count and any stale active-polling marker.
    ///
    /// A permit issued before the reset no longer owns the marker: dropping
    /// it later leaves any newer poll of the same job in place.
    pub fn reset_circuit_breaker(&self, job_id: JobId) {
        let mut state = self.lock();
        state.failures.remove(&job_id);
        state.active.remove(&job_id);
        debug!(%job_id, "circuit breaker reset");
    }

    pub fn is_circuit_breaker_open(&self, job_id: JobId) -> bool {
        self.failure_count(job_id) >= self.failure_threshold
    }

    pub fn failure_count(&self, job_id: JobId) -> u32 {
        self.lock().failures.get(&job_id).copied().unwrap_or(0)
    }

    pub fn is_polling(&self, job_id: JobId) -> bool {
        self.lock().active.contains_key(&job_id)
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        let state = self.lock();
        GuardSnapshot {
            active_polls: state.active.len(),
            tracked_failures: state.failures.len(),
            open_breakers: state
                .failures
                .values()
                .filter(|&&n| n >= self.failure_threshold)
                .count(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        // Advisory state: a poisoned lock still holds usable sets.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PollingGuard {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Proof that the holder is the only poller of `job_id`.
///
/// Dropping it (on return, error, panic or cancellation) releases the job id,
/// unless a reset already handed the id to a newer permit.
#[derive(Debug)]
pub struct PollPermit {
    guard: Arc<PollingGuard>,
    job_id: JobId,
    generation: u64,
}

impl Drop for PollPermit {
    fn drop(&mut self) {
        let mut state = self.guard.lock();
        if state.active.get(&self.job_id) == Some(&self.generation) {
            state.active.remove(&self.job_id);
        }
    }
}
