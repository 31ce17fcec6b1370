//! Events - pass の進行を外部（通知・ステータス表示）に伝えるイベント
//!
//! StatusSink port 経由で送る。通知は 2 状態（実行中 / 完了 N 件）に畳み込む。

use serde::{Deserialize, Serialize};

use super::errors::SyncError;
use super::ids::PassId;

/// SyncEvent は pass の中で発生したイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Credential and destination are being resolved.
    Connecting { pass_id: PassId },

    /// Transfer `index` (1-based) of `total` started.
    Uploading {
        pass_id: PassId,
        name: String,
        index: usize,
        total: usize,
    },

    Uploaded { pass_id: PassId, name: String, bytes: u64 },

    TransferFailed {
        pass_id: PassId,
        name: String,
        reason: String,
    },

    /// The per-artifact loop finished.
    Completed {
        pass_id: PassId,
        uploaded: usize,
        failed: usize,
    },

    /// The pass ended before (or while) transferring.
    Failed { pass_id: PassId, reason: String },
}

impl SyncEvent {
    pub fn failed(pass_id: PassId, error: &SyncError) -> Self {
        SyncEvent::Failed {
            pass_id,
            reason: error.short_reason().to_string(),
        }
    }

    pub fn pass_id(&self) -> PassId {
        match self {
            SyncEvent::Connecting { pass_id }
            | SyncEvent::Uploading { pass_id, .. }
            | SyncEvent::Uploaded { pass_id, .. }
            | SyncEvent::TransferFailed { pass_id, .. }
            | SyncEvent::Completed { pass_id, .. }
            | SyncEvent::Failed { pass_id, .. } => *pass_id,
        }
    }

    /// User-facing status line.
    pub fn status_text(&self) -> String {
        match self {
            SyncEvent::Connecting { .. } => "connecting".to_string(),
            SyncEvent::Uploading {
                name, index, total, ..
            } => format!("uploading {index}/{total}: {name}"),
            SyncEvent::Uploaded { name, .. } => format!("uploaded {name}"),
            SyncEvent::TransferFailed { name, reason, .. } => {
                format!("failed to upload {name}: {reason}")
            }
            SyncEvent::Completed { uploaded, .. } => files_uploaded_text(*uploaded),
            SyncEvent::Failed { reason, .. } => format!("upload failed: {reason}"),
        }
    }

    /// Notification state after this event, if it changes it.
    pub fn notification(&self) -> Option<Notification> {
        match self {
            SyncEvent::Connecting { .. } | SyncEvent::Uploading { .. } => {
                Some(Notification::InProgress {
                    text: self.status_text(),
                })
            }
            SyncEvent::Completed { uploaded, .. } => Some(Notification::Completed {
                files: *uploaded,
            }),
            SyncEvent::Failed { .. } => Some(Notification::Completed { files: 0 }),
            SyncEvent::Uploaded { .. } | SyncEvent::TransferFailed { .. } => None,
        }
    }
}

/// The two-state progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Notification {
    /// Persistent until the pass completes.
    InProgress { text: String },
    Completed { files: usize },
}

impl Notification {
    pub fn is_ongoing(&self) -> bool {
        matches!(self, Notification::InProgress { .. })
    }

    pub fn text(&self) -> String {
        match self {
            Notification::InProgress { text } => text.clone(),
            Notification::Completed { files } => files_uploaded_text(*files),
        }
    }
}

fn files_uploaded_text(n: usize) -> String {
    match n {
        1 => "1 file uploaded".to_string(),
        n => format!("{n} files uploaded"),
    }
}
