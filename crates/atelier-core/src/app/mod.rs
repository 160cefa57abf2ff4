//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Orchestrator**: 投入（create + trigger）と完了待ちの窓口
//! - **OrchestratorBuilder**: Orchestrator の構築と起動時検証
//! - **Poller**: exponential backoff / fixed interval の 2 戦略
//! - **PollingGuard**: 重複ポーリング防止とジョブ単位のサーキットブレーカー
//! - **JobFinder**: active / recent ジョブの検索（重複投入の防止）

pub mod backoff;
pub mod builder;
pub mod config;
pub mod finder;
pub mod guard;
pub mod orchestrator;
pub mod poller;

// 主要な型を再エクスポート
pub use self::backoff::BackoffPolicy;
pub use self::builder::{BuildError, OrchestratorBuilder};
pub use self::config::{Environment, ExecutorEndpoint, PollerConfig, TriggerConfig, WaitOptions};
pub use self::finder::{AllOf, FieldMatch, InputPredicate, JobFinder, MatchOp, any_input};
pub use self::guard::{GuardSnapshot, PollPermit, PollingGuard};
pub use self::orchestrator::{Orchestrator, SubmitOrReuse, Submission};
pub use self::poller::Poller;
