//! Work record: request + state + attempt history.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{WorkRequest, WorkState};
use crate::domain::{PassOutcome, PassReport, PassScope, WorkId};

/// One finished pass of a work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt: u32,
    pub outcome: PassOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a work's waiters receive once it is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkReport {
    pub work_id: WorkId,
    pub name: String,
    pub state: WorkState,
    pub attempts: u32,

    /// Outcome of the last pass; `None` when cancelled before any pass finished.
    pub outcome: Option<PassOutcome>,

    /// Report of the last pass that reached its per-artifact loop.
    pub last_report: Option<PassReport>,

    pub history: Vec<AttemptSummary>,
}

/// Snapshot for status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkStatus {
    pub work_id: WorkId,
    pub name: String,
    pub scope: PassScope,
    pub state: WorkState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
}

/// Host-side record of a named work.
///
/// The single source of truth for a work's state; the ready / scheduled queues
/// hold `WorkId`s only.
#[derive(Debug)]
pub struct WorkRecord {
    pub work_id: WorkId,
    pub request: WorkRequest,
    pub state: WorkState,

    /// Passes started so far (including the current one if Running).
    pub attempts: u32,
    pub max_attempts: u32,

    pub last_error: Option<String>,
    pub last_report: Option<PassReport>,
    pub history: Vec<AttemptSummary>,

    /// When to run next (RetryScheduled only).
    pub next_run_at: Option<Instant>,

    pub cancel: CancellationToken,
    waiters: Vec<oneshot::Sender<WorkReport>>,
}

impl WorkRecord {
    pub fn new(work_id: WorkId, request: WorkRequest, max_attempts: u32) -> Self {
        Self {
            work_id,
            request,
            state: WorkState::Enqueued,
            attempts: 0,
            max_attempts,
            last_error: None,
            last_report: None,
            history: Vec::new(),
            next_run_at: None,
            cancel: CancellationToken::new(),
            waiters: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.request.name
    }

    pub fn subscribe(&mut self) -> oneshot::Receiver<WorkReport> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }

    pub fn start_attempt(&mut self) {
        self.state = WorkState::Running;
        self.attempts += 1;
        self.next_run_at = None;
    }

    /// Record the result of the pass that just finished.
    pub fn record_pass(&mut self, outcome: PassOutcome, report: Option<PassReport>, error: Option<String>) {
        self.history.push(AttemptSummary {
            attempt: self.attempts,
            outcome,
            error: error.clone(),
        });
        self.last_error = error;
        if report.is_some() {
            self.last_report = report;
        }
    }

    pub fn schedule_retry(&mut self, next_run_at: Instant) {
        self.state = WorkState::RetryScheduled;
        self.next_run_at = Some(next_run_at);
    }

    /// Move from RetryScheduled back to Enqueued.
    pub fn requeue(&mut self) {
        self.state = WorkState::Enqueued;
        self.next_run_at = None;
    }

    /// Enter a terminal state and hand the report to every waiter.
    pub fn finish(&mut self, state: WorkState) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.next_run_at = None;
        let report = self.report();
        for waiter in self.waiters.drain(..) {
            // receiver may have been dropped
            let _ = waiter.send(report.clone());
        }
    }

    pub fn report(&self) -> WorkReport {
        WorkReport {
            work_id: self.work_id,
            name: self.request.name.clone(),
            state: self.state,
            attempts: self.attempts,
            outcome: self.history.last().map(|a| a.outcome),
            last_report: self.last_report.clone(),
            history: self.history.clone(),
        }
    }

    pub fn status(&self) -> WorkStatus {
        WorkStatus {
            work_id: self.work_id,
            name: self.request.name.clone(),
            scope: self.request.scope.clone(),
            state: self.state,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            last_error: self.last_error.clone(),
        }
    }
}
