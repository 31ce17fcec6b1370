//! Status - 進捗通知の状態
//!
//! 通知は「実行中（テキスト更新あり）」と「完了 N 件」の 2 状態だけを持つ。

use std::sync::Mutex;

use crate::domain::{Notification, SyncEvent};
use crate::ports::StatusSink;

/// Keeps the latest notification state; what a notification surface would show.
#[derive(Debug, Default)]
pub struct NotificationTracker {
    current: Mutex<Option<Notification>>,
}

impl NotificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Notification> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StatusSink for NotificationTracker {
    fn emit(&self, event: &SyncEvent) {
        if let Some(next) = event.notification() {
            *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PassId;
    use ulid::Ulid;

    #[test]
    fn tracks_in_progress_then_completed() {
        let tracker = NotificationTracker::new();
        let pass_id = PassId::from_ulid(Ulid::new());
        assert!(tracker.current().is_none());

        tracker.emit(&SyncEvent::Connecting { pass_id });
        assert!(tracker.current().unwrap().is_ongoing());

        tracker.emit(&SyncEvent::Uploading {
            pass_id,
            name: "rec_a.m4a".into(),
            index: 1,
            total: 1,
        });
        assert_eq!(tracker.current().unwrap().text(), "uploading 1/1: rec_a.m4a");

        // per-file events leave the notification alone
        tracker.emit(&SyncEvent::Uploaded {
            pass_id,
            name: "rec_a.m4a".into(),
            bytes: 3,
        });
        assert!(tracker.current().unwrap().is_ongoing());

        tracker.emit(&SyncEvent::Completed {
            pass_id,
            uploaded: 1,
            failed: 0,
        });
        assert_eq!(tracker.current(), Some(Notification::Completed { files: 1 }));
    }
}
