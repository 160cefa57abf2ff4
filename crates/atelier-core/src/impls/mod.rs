//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryJobStore**: 開発・テスト用のジョブテーブル
//! - **HttpExecutionTrigger**: reqwest による executor への通知
//!
//! # 本番用実装
//! 本番のジョブテーブル（Postgres など）は別クレートで `JobStore` を実装します。

pub mod http_trigger;
pub mod inmem_store;

// 主要な型を再エクスポート
pub use self::http_trigger::HttpExecutionTrigger;
pub use self::inmem_store::InMemoryJobStore;
