//! OrchestratorBuilder - Orchestrator の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;
use std::time::Duration;

use super::config::PollerConfig;
use super::finder::DEFAULT_RECENT_WINDOW;
use super::orchestrator::Orchestrator;
use crate::ports::{Clock, ExecutionTrigger, JobStore, SystemClock};

/// OrchestratorBuilder は Orchestrator を構築
///
/// # 使用例
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .store(Arc::new(InMemoryJobStore::new()))
///     .trigger(HttpExecutionTrigger::new(TriggerConfig::from_env(), session))
///     .poller_config(PollerConfig::default())
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - store と trigger は必須
/// - 0 回で開くブレーカーや 0 秒のバックオフ上限は build() 時に拒否
pub struct OrchestratorBuilder<S, T> {
    store: Option<Arc<S>>,
    trigger: Option<T>,
    clock: Arc<dyn Clock>,
    poller: PollerConfig,
    recent_window: Duration,
}

/// BuildError は Orchestrator 構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("No job store configured. Call `.store(...)` before `.build()`.")]
    MissingStore,

    #[error("No execution trigger configured. Call `.trigger(...)` before `.build()`.")]
    MissingTrigger,

    #[error("Invalid poller configuration: {0}")]
    InvalidConfig(String),
}

impl<S: JobStore, T: ExecutionTrigger> OrchestratorBuilder<S, T> {
    pub fn new() -> Self {
        Self {
            store: None,
            trigger: None,
            clock: Arc::new(SystemClock),
            poller: PollerConfig::default(),
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }

    pub fn store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn trigger(mut self, trigger: T) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Clock used for the recent-job window.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn poller_config(mut self, config: PollerConfig) -> Self {
        self.poller = config;
        self
    }

    pub fn recent_window(mut self, window: Duration) -> Self {
        self.recent_window = window;
        self
    }

    pub fn build(self) -> Result<Orchestrator<S, T>, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let trigger = self.trigger.ok_or(BuildError::MissingTrigger)?;
        if self.poller.failure_threshold == 0 {
            return Err(BuildError::InvalidConfig(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.poller.max_interval.is_zero() {
            return Err(BuildError::InvalidConfig(
                "max_interval must be greater than zero".to_string(),
            ));
        }
        Ok(Orchestrator::from_parts(
            store,
            trigger,
            self.clock,
            self.poller,
            self.recent_window,
        ))
    }
}

impl<S: JobStore, T: ExecutionTrigger> Default for OrchestratorBuilder<S, T> {
    fn default() -> Self {
        Self::new()
    }
}
