//! Outcome model: what a pass reports back to the host.
//!
//! The host only sees `PassOutcome`. It decides retry / backoff on its own;
//! the synchronizer never sleeps or retries by itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::delta::PassScope;
use super::errors::SyncError;
use super::ids::{FolderId, PassId};
use super::transfer::{TransferStatus, TransferTask};

/// Pass-level classification handed to the host.
///
/// Serialized as SCREAMING_SNAKE_CASE: ALL_SUCCEEDED / PARTIAL_FAILURE_RETRY /
/// HARD_FAILURE_NO_RETRY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassOutcome {
    /// Every selected artifact was transferred (or nothing needed transferring).
    AllSucceeded,

    /// Something transient failed; rerunning the whole pass is safe.
    PartialFailureRetry,

    /// No destination, or no valid credential. Needs the user, not a retry.
    HardFailureNoRetry,
}

impl PassOutcome {
    /// Map a pass result onto the three reportable outcomes.
    pub fn of(result: &Result<PassReport, SyncError>) -> Self {
        match result {
            Ok(report) => report.outcome,
            Err(err) if err.is_retryable() => PassOutcome::PartialFailureRetry,
            Err(_) => PassOutcome::HardFailureNoRetry,
        }
    }
}

/// Per-artifact line of a pass report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub display_name: String,
    pub status: TransferStatus,
    pub bytes_sent: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TransferTask> for TransferSummary {
    fn from(task: &TransferTask) -> Self {
        Self {
            display_name: task.artifact.display_name.clone(),
            status: task.status,
            bytes_sent: task.bytes_sent,
            error: task.last_error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Result of a pass that reached its per-artifact loop and finished it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: PassId,
    pub scope: PassScope,
    pub folder_id: FolderId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Local artifacts in scope (before name suppression).
    pub candidates: usize,

    /// One entry per artifact in the delta, in delta order.
    pub transfers: Vec<TransferSummary>,

    pub outcome: PassOutcome,
}

impl PassReport {
    pub fn uploaded(&self) -> usize {
        self.count(TransferStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.transfers.iter().filter(|t| t.status.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.candidates.saturating_sub(self.transfers.len())
    }

    fn count(&self, status: TransferStatus) -> usize {
        self.transfers.iter().filter(|t| t.status == status).count()
    }

    /// Outcome implied by a set of finished transfers.
    pub fn outcome_for(transfers: &[TransferSummary]) -> PassOutcome {
        if transfers.iter().any(|t| t.status != TransferStatus::Succeeded) {
            PassOutcome::PartialFailureRetry
        } else {
            PassOutcome::AllSucceeded
        }
    }
}
