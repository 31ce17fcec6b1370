//! Work state machine for the host.

use serde::{Deserialize, Serialize};

/// State of one named work.
///
/// State transitions:
/// - Enqueued -> Running -> Succeeded
/// - Enqueued -> Running -> RetryScheduled -> Enqueued (loop until the decider gives up)
/// - Enqueued -> Running -> Failed
/// - any non-terminal -> Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    /// Ready to run immediately.
    Enqueued,

    /// A pass is executing right now.
    Running,

    /// Waiting for backoff before the next pass.
    RetryScheduled,

    Succeeded,

    /// Given up: hard failure, or retries exhausted.
    Failed,

    /// Cancelled or replaced; an in-flight pass was abandoned.
    Cancelled,
}

impl WorkState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkState::Succeeded | WorkState::Failed | WorkState::Cancelled
        )
    }

    pub fn is_runnable(self) -> bool {
        matches!(self, WorkState::Enqueued)
    }
}

/// Number of works per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCounts {
    pub enqueued: usize,
    pub running: usize,
    pub retry_scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl WorkCounts {
    pub fn add(&mut self, state: WorkState) {
        match state {
            WorkState::Enqueued => self.enqueued += 1,
            WorkState::Running => self.running += 1,
            WorkState::RetryScheduled => self.retry_scheduled += 1,
            WorkState::Succeeded => self.succeeded += 1,
            WorkState::Failed => self.failed += 1,
            WorkState::Cancelled => self.cancelled += 1,
        }
    }

    /// Works that have not reached a terminal state.
    pub fn active(&self) -> usize {
        self.enqueued + self.running + self.retry_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(WorkState::Succeeded.is_terminal());
        assert!(WorkState::Failed.is_terminal());
        assert!(WorkState::Cancelled.is_terminal());
        assert!(!WorkState::RetryScheduled.is_terminal());
        assert!(WorkState::Enqueued.is_runnable());
        assert!(!WorkState::Running.is_runnable());
    }

    #[test]
    fn counts_track_active_work() {
        let mut counts = WorkCounts::default();
        for s in [WorkState::Enqueued, WorkState::Running, WorkState::Failed] {
            counts.add(s);
        }
        assert_eq!(counts.active(), 2);
        assert_eq!(counts.failed, 1);
    }
}
