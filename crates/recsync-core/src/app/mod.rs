//! App - アプリケーション層
//!
//! ports を組み合わせて 1 pass 分の同期ロジックを実装する。
//!
//! # 主要コンポーネント
//! - **SynchronizerBuilder**: synchronizer の構築とワイヤリング
//! - **UploadSynchronizer**: resolve → list → delta → transfer の 1 pass
//! - **UploadTask**: 保存済みの destination と credential から pass を組み立てる
//! - **NotificationTracker**: 2 状態の進捗通知

pub mod builder;
pub mod remote;
pub mod status;
pub mod synchronizer;
pub mod task;

pub use self::builder::{BuildError, DEFAULT_NAMESPACE, DEFAULT_PARENT, SynchronizerBuilder};
pub use self::status::NotificationTracker;
pub use self::synchronizer::{SyncOptions, UploadSynchronizer};
pub use self::task::UploadTask;
