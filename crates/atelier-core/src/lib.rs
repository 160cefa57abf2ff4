//! atelier-core
//!
//! AI ジョブ（自動タグ付け、商品写真、ヘッドショット、コーデのレンダリングなど）の
//! 投入・起動・完了検知を担うクライアント側のオーケストレーション。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, payload, job, policy）
//! - **ports**: 抽象化レイヤー（JobStore, ExecutionTrigger, SessionProvider, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（orchestrator, poller, guard, finder, config, builder）
//! - **impls**: 実装（InMemoryJobStore, HttpExecutionTrigger）
//! - **error**: オーケストレーションのエラー型
//! - **observability**: ログ初期化とステータス集計

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;

#[cfg(test)]
mod testing;

pub use app::{Orchestrator, OrchestratorBuilder, SubmitOrReuse, Submission, WaitOptions};
pub use error::OrchestratorError;
pub use observability::init_tracing;
