//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部コラボレーター（ジョブテーブル、認証、executor）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ジョブテーブルが source of truth（正本）。この crate は読むだけ
//! - executor への通知は fire-and-forget
//! - 時刻と ID 生成は差し替え可能（テスト容易性）

pub mod clock;
pub mod id_generator;
pub mod job_store;
pub mod session;
pub mod trigger;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_store::{JobOrder, JobQuery, JobStore, StoreError};
pub use self::session::{SessionProvider, StaticSession};
pub use self::trigger::{ExecutionTrigger, TriggerOutcome};
