//! Transfer task state machine (one per artifact per pass).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::LocalArtifact;
use super::errors::SyncError;
use super::ids::FolderId;

/// Status of one artifact's transfer within a pass.
///
/// State transitions:
/// - Pending -> InFlight -> Succeeded
/// - Pending -> InFlight -> FailedRetryable (transport, auth, partial content)
/// - Pending -> InFlight -> FailedTerminal (configuration)
///
/// A task left in Pending was never attempted (the pass aborted first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InFlight,
    Succeeded,
    FailedRetryable,
    FailedTerminal,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Succeeded | TransferStatus::FailedRetryable | TransferStatus::FailedTerminal
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TransferStatus::FailedRetryable | TransferStatus::FailedTerminal
        )
    }
}

/// The unit of work for one artifact. Discarded at the end of the pass.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub artifact: LocalArtifact,
    pub destination: FolderId,
    pub status: TransferStatus,

    /// Bytes streamed to the remote store during the attempt.
    pub bytes_sent: u64,

    pub last_error: Option<SyncError>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TransferTask {
    pub fn new(artifact: LocalArtifact, destination: FolderId) -> Self {
        Self {
            artifact,
            destination,
            status: TransferStatus::Pending,
            bytes_sent: 0,
            last_error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.artifact.display_name
    }

    fn start(&mut self, now: DateTime<Utc>) {
        self.status = TransferStatus::InFlight;
        self.started_at = Some(now);
    }

    pub fn mark_succeeded(&mut self, bytes_sent: u64, now: DateTime<Utc>) {
        self.status = TransferStatus::Succeeded;
        self.bytes_sent = bytes_sent;
        self.finished_at = Some(now);
    }

    pub fn mark_failed(&mut self, error: SyncError, bytes_sent: u64, now: DateTime<Utc>) {
        self.status = match error {
            SyncError::Configuration(_) => TransferStatus::FailedTerminal,
            _ => TransferStatus::FailedRetryable,
        };
        self.bytes_sent = bytes_sent;
        self.last_error = Some(error);
        self.finished_at = Some(now);
    }
}

/// The pass's tasks, in delta order.
///
/// Guards the "at most one InFlight per display name" invariant.
#[derive(Debug, Default)]
pub struct TransferSet {
    tasks: Vec<TransferTask>,
}

impl TransferSet {
    pub fn new(delta: Vec<LocalArtifact>, destination: &FolderId) -> Self {
        Self {
            tasks: delta
                .into_iter()
                .map(|a| TransferTask::new(a, destination.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TransferTask> {
        self.tasks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TransferTask> {
        self.tasks.get_mut(index)
    }

    /// Move task `index` to InFlight.
    ///
    /// Returns false (and leaves the task Pending) when another task with the same
    /// display name is already InFlight, or the task is not Pending.
    pub fn start(&mut self, index: usize, now: DateTime<Utc>) -> bool {
        let Some(name) = self.tasks.get(index).map(|t| t.artifact.display_name.clone()) else {
            return false;
        };
        let busy = self
            .tasks
            .iter()
            .enumerate()
            .any(|(i, t)| i != index && t.status == TransferStatus::InFlight && t.name() == name);
        match self.tasks.get_mut(index) {
            Some(task) if !busy && task.status == TransferStatus::Pending => {
                task.start(now);
                true
            }
            _ => false,
        }
    }

    pub fn count(&self, status: TransferStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferTask> {
        self.tasks.iter()
    }

    pub fn into_tasks(self) -> Vec<TransferTask> {
        self.tasks
    }
}

/// Post-upload byte check of one transfer.
///
/// `expected` is the catalog's size, `sent` what streamed out of the device,
/// `stored` what the remote store says it kept. Unknown sizes are not checked.
#[derive(Debug, Clone, Copy)]
pub struct UploadCheck<'a> {
    pub name: &'a str,
    pub expected: Option<u64>,
    pub sent: u64,
    pub stored: Option<u64>,
}

impl UploadCheck<'_> {
    pub fn verify(&self) -> Result<(), SyncError> {
        if let Some(expected) = self.expected
            && expected != self.sent
        {
            return Err(self.partial(expected, self.sent));
        }
        if let Some(stored) = self.stored
            && stored != self.sent
        {
            return Err(self.partial(self.sent, stored));
        }
        Ok(())
    }

    fn partial(&self, expected: u64, actual: u64) -> SyncError {
        SyncError::PartialContent {
            name: self.name.to_string(),
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::ContentLocator;
    use crate::domain::ids::LocalId;
    use chrono::TimeZone;
    use rstest::rstest;

    fn artifact(id: &str, name: &str) -> LocalArtifact {
        LocalArtifact {
            local_id: LocalId::new(id),
            display_name: name.to_string(),
            mime_type: "audio/mp4".to_string(),
            content: ContentLocator::new(id),
            size: Some(3),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_set_is_all_pending() {
        let set = TransferSet::new(
            vec![artifact("1", "a"), artifact("2", "b")],
            &FolderId::new("f"),
        );
        assert_eq!(set.count(TransferStatus::Pending), 2);
        assert_eq!(set.get(0).unwrap().destination.as_str(), "f");
    }

    #[test]
    fn same_name_cannot_be_in_flight_twice() {
        let mut set = TransferSet::new(
            vec![artifact("1", "same"), artifact("2", "same")],
            &FolderId::new("f"),
        );

        assert!(set.start(0, now()));
        assert!(!set.start(1, now()));
        assert_eq!(set.get(1).unwrap().status, TransferStatus::Pending);

        set.get_mut(0).unwrap().mark_succeeded(3, now());
        assert!(set.start(1, now()));
    }

    #[test]
    fn a_task_starts_only_once() {
        let mut set = TransferSet::new(vec![artifact("1", "a")], &FolderId::new("f"));
        assert!(set.start(0, now()));
        assert!(!set.start(0, now()));
        assert!(!set.start(7, now()));
    }

    #[rstest]
    #[case::transport(SyncError::Transport("x".into()), TransferStatus::FailedRetryable)]
    #[case::auth(SyncError::Auth("x".into()), TransferStatus::FailedRetryable)]
    #[case::partial(
        SyncError::PartialContent { name: "a".into(), expected: 3, actual: 1 },
        TransferStatus::FailedRetryable
    )]
    #[case::configuration(SyncError::Configuration("x".into()), TransferStatus::FailedTerminal)]
    fn failure_status(#[case] err: SyncError, #[case] expected: TransferStatus) {
        let mut task = TransferTask::new(artifact("1", "a"), FolderId::new("f"));
        task.mark_failed(err, 1, now());
        assert_eq!(task.status, expected);
        assert!(task.status.is_failure());
        assert!(task.status.is_terminal());
        assert_eq!(task.bytes_sent, 1);
    }

    #[rstest]
    #[case::complete(Some(3), 3, Some(3), None)]
    #[case::sizes_unknown(None, 3, None, None)]
    #[case::short_read(Some(3), 2, Some(2), Some((3, 2)))]
    #[case::truncated_remotely(Some(3), 3, Some(1), Some((3, 1)))]
    #[case::remote_size_unknown(Some(3), 3, None, None)]
    fn upload_check(
        #[case] expected: Option<u64>,
        #[case] sent: u64,
        #[case] stored: Option<u64>,
        #[case] mismatch: Option<(u64, u64)>,
    ) {
        let check = UploadCheck { name: "a.m4a", expected, sent, stored };
        match (check.verify(), mismatch) {
            (Ok(()), None) => {}
            (Err(SyncError::PartialContent { expected, actual, .. }), Some(m)) => {
                assert_eq!((expected, actual), m)
            }
            (other, m) => panic!("unexpected {other:?} for {m:?}"),
        }
    }
}
