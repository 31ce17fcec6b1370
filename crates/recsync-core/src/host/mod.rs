//! Host - バックグラウンド実行ホスト
//!
//! pass を「名前付きの仕事」として受け付け、1 本の worker で順番に実行する。
//! 同じ名前の仕事が同時に 2 つ走ることはない。再試行とバックオフは
//! ここだけが持つ（synchronizer は PassOutcome を返すだけ）。
//!
//! # 構成
//! - **SyncHost**: submit / cancel / status / shutdown
//! - **WorkRecord**: 仕事ごとの状態（唯一の真実）
//! - **Decider**: PassOutcome → Finish / Retry / GiveUp
//! - **RetryPolicy**: 指数バックオフ

pub mod decision;
pub mod record;
pub mod retry;
pub mod runtime;
pub mod state;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{LocalId, PassReport, PassScope, SyncError};

pub use self::decision::{Decider, Decision, DefaultDecider};
pub use self::record::{AttemptSummary, WorkRecord, WorkReport, WorkStatus};
pub use self::retry::RetryPolicy;
pub use self::runtime::{HostOptions, SyncHost, WorkHandle};
pub use self::state::{WorkCounts, WorkState};

/// Unique name of the global sync work.
pub const SYNC_ALL: &str = "sync-all";

/// The task body the host invokes once per attempt.
#[async_trait]
pub trait PassRunner: Send + Sync {
    async fn run(&self, scope: &PassScope) -> Result<PassReport, SyncError>;
}

/// A named unit of work: at most one active instance per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub name: String,
    pub scope: PassScope,
}

impl WorkRequest {
    pub fn sync_all() -> Self {
        Self {
            name: SYNC_ALL.to_string(),
            scope: PassScope::All,
        }
    }

    /// Upload of a single artifact, named `upload:<local_id>`.
    pub fn upload(local_id: LocalId) -> Self {
        Self {
            name: format!("upload:{local_id}"),
            scope: PassScope::Single(local_id),
        }
    }
}

/// What `submit` does when active work with the same name exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingWork {
    /// Keep the active work; the new handle waits for it.
    #[default]
    Keep,

    /// Cancel the active work (abandoning any in-flight pass) and enqueue anew.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host has shut down")]
    ShutDown,
}
