//! SyncHost - in-process background host with one sequential worker.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use tokio::sync::{Mutex, Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::{
    Decider, Decision, DefaultDecider, ExistingWork, HostError, PassRunner, WorkCounts,
    WorkRecord, WorkReport, WorkRequest, WorkState, WorkStatus,
};
use crate::domain::{PassOutcome, PassReport, SyncError, WorkId};
use crate::ports::IdGenerator;

/// Scheduled entry; reverse ordering turns BinaryHeap into a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledWork {
    next_run_at: Instant,
    work_id: WorkId,
}

impl PartialOrd for ScheduledWork {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledWork {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .next_run_at
            .cmp(&self.next_run_at)
            .then_with(|| other.work_id.cmp(&self.work_id))
    }
}

pub struct HostOptions {
    /// Passes per work before the decider gives up on retryable failures.
    pub max_attempts: u32,
    pub decider: Arc<dyn Decider>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            decider: Arc::new(DefaultDecider::default()),
        }
    }
}

/// Terminal records are kept only while they are the latest work of their name,
/// so `records` is bounded by the number of distinct names.
#[derive(Default)]
struct HostState {
    records: HashMap<WorkId, WorkRecord>,

    /// Latest work per unique name.
    by_name: HashMap<String, WorkId>,

    ready: VecDeque<WorkId>,
    scheduled: BinaryHeap<ScheduledWork>,
    stopped: bool,
}

impl HostState {
    fn active(&self, name: &str) -> Option<WorkId> {
        let id = self.by_name.get(name)?;
        let record = self.records.get(id)?;
        (!record.state.is_terminal()).then_some(*id)
    }

    /// Move works from scheduled to ready if their time has come.
    fn promote_scheduled(&mut self, now: Instant) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_run_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.work_id)
                && record.state == WorkState::RetryScheduled
            {
                record.requeue();
                self.ready.push_back(entry.work_id);
            }
        }
    }

    /// Next runnable work; entries whose record moved on (cancelled) are skipped.
    fn pop_ready(&mut self) -> Option<WorkId> {
        while let Some(id) = self.ready.pop_front() {
            if self.records.get(&id).is_some_and(|r| r.state.is_runnable()) {
                return Some(id);
            }
        }
        None
    }

    fn is_latest(&self, id: WorkId) -> bool {
        self.records
            .get(&id)
            .is_some_and(|r| self.by_name.get(r.name()) == Some(&id))
    }

    /// Drop a terminal record that a newer work of the same name superseded.
    fn retire(&mut self, id: WorkId) {
        let terminal = self.records.get(&id).is_some_and(|r| r.state.is_terminal());
        if terminal && !self.is_latest(id) {
            self.records.remove(&id);
        }
    }

    /// Register a new work as the latest of its name, pruning the terminal
    /// record it replaces.
    fn register(&mut self, record: WorkRecord) {
        let work_id = record.work_id;
        let previous = self.by_name.insert(record.name().to_string(), work_id);
        self.records.insert(work_id, record);
        if let Some(previous) = previous {
            self.retire(previous);
        }
        self.ready.push_back(work_id);
    }

    /// Cancel a non-terminal work. Running work is finished by the worker
    /// once its pass is abandoned.
    fn cancel(&mut self, id: WorkId) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        if record.state.is_terminal() {
            return false;
        }
        record.cancel.cancel();
        if record.state != WorkState::Running {
            record.finish(WorkState::Cancelled);
        }
        true
    }
}

struct HostInner {
    runner: Arc<dyn PassRunner>,
    ids: Arc<dyn IdGenerator>,
    options: HostOptions,
    state: Mutex<HostState>,
    notify: Notify,
}

/// Waits for a submitted work to reach a terminal state.
#[derive(Debug)]
pub struct WorkHandle {
    work_id: WorkId,
    name: String,
    rx: oneshot::Receiver<WorkReport>,
}

impl WorkHandle {
    pub fn work_id(&self) -> WorkId {
        self.work_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves once the work succeeded, failed or was cancelled.
    pub async fn wait(self) -> Result<WorkReport, HostError> {
        self.rx.await.map_err(|_| HostError::ShutDown)
    }
}

/// Host handle.
/// - `shutdown()` で worker を止め、終了を待つ
/// - 同じ名前の仕事は高々 1 つしか active にならない
pub struct SyncHost {
    inner: Arc<HostInner>,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl SyncHost {
    /// Spawn the host's worker on the current tokio runtime.
    pub fn spawn(
        runner: Arc<dyn PassRunner>,
        ids: Arc<dyn IdGenerator>,
        options: HostOptions,
    ) -> Self {
        let inner = Arc::new(HostInner {
            runner,
            ids,
            options,
            state: Mutex::new(HostState::default()),
            notify: Notify::new(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(worker_loop(Arc::clone(&inner), shutdown_rx));
        Self {
            inner,
            shutdown_tx,
            worker,
        }
    }

    /// Enqueue unique named work.
    pub async fn submit(
        &self,
        request: WorkRequest,
        existing: ExistingWork,
    ) -> Result<WorkHandle, HostError> {
        let mut state = self.inner.state.lock().await;
        if state.stopped {
            return Err(HostError::ShutDown);
        }

        if let Some(active) = state.active(&request.name) {
            match existing {
                ExistingWork::Keep => {
                    if let Some(record) = state.records.get_mut(&active) {
                        debug!(work_id = %active, name = %request.name, "keeping active work");
                        return Ok(WorkHandle {
                            work_id: active,
                            name: request.name,
                            rx: record.subscribe(),
                        });
                    }
                }
                ExistingWork::Replace => {
                    info!(work_id = %active, name = %request.name, "replacing active work");
                    state.cancel(active);
                }
            }
        }

        let work_id = self.inner.ids.generate_work_id();
        let mut record = WorkRecord::new(work_id, request, self.inner.options.max_attempts);
        let rx = record.subscribe();
        let name = record.name().to_string();
        state.register(record);
        drop(state);

        info!(%work_id, name = %name, "work enqueued");
        self.inner.notify.notify_one();
        Ok(WorkHandle { work_id, name, rx })
    }

    /// Cancel the active work named `name`. Returns false if there is none.
    pub async fn cancel(&self, name: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        let Some(id) = state.active(name) else {
            return false;
        };
        info!(work_id = %id, name, "cancelling work");
        state.cancel(id)
    }

    /// Latest work registered under `name`.
    pub async fn status(&self, name: &str) -> Option<WorkStatus> {
        let state = self.inner.state.lock().await;
        let id = state.by_name.get(name)?;
        state.records.get(id).map(WorkRecord::status)
    }

    pub async fn counts(&self) -> WorkCounts {
        let state = self.inner.state.lock().await;
        let mut counts = WorkCounts::default();
        for record in state.records.values() {
            counts.add(record.state);
        }
        counts
    }

    /// Stop taking new work, abandon whatever is running, and wait for the worker.
    ///
    /// Handles of unfinished work resolve to `HostError::ShutDown`.
    pub async fn shutdown(self) {
        {
            let mut state = self.inner.state.lock().await;
            state.stopped = true;
            for record in state.records.values() {
                record.cancel.cancel();
            }
        }
        // ignore send error: the worker may already be gone
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.worker.await {
            warn!(error = %err, "host worker ended abnormally");
        }
        // drop remaining waiters
        self.inner.state.lock().await.records.clear();
    }
}

async fn worker_loop(inner: Arc<HostInner>, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let (next, next_wake) = {
            let mut state = inner.state.lock().await;
            state.promote_scheduled(Instant::now());
            let next = state.pop_ready();
            (next, state.scheduled.peek().map(|entry| entry.next_run_at))
        };

        if let Some(work_id) = next {
            run_work(&inner, work_id).await;
            continue;
        }

        // 何もなければ submit / 次の予定時刻 / shutdown のどれかを待つ
        match next_wake {
            Some(wake) => {
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = inner.notify.notified() => {}
                    _ = tokio::time::sleep_until(wake) => {}
                }
            }
            None => {
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = inner.notify.notified() => {}
                }
            }
        }
    }
    debug!("host worker stopped");
}

async fn run_work(inner: &HostInner, work_id: WorkId) {
    let (scope, cancel, name, attempt) = {
        let mut state = inner.state.lock().await;
        let Some(record) = state.records.get_mut(&work_id) else {
            return;
        };
        record.start_attempt();
        (
            record.request.scope.clone(),
            record.cancel.clone(),
            record.name().to_string(),
            record.attempts,
        )
    };

    let span = info_span!("work", %work_id, name = %name, attempt);
    async {
        debug!("pass started");
        // a panicking runner must not take the worker down with it
        let pass = AssertUnwindSafe(inner.runner.run(&scope)).catch_unwind();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = pass => Some(result),
        };

        let mut guard = inner.state.lock().await;
        let state = &mut *guard;
        finish_attempt(state, &inner.options, work_id, result);
        state.retire(work_id);
    }
    .instrument(span)
    .await
}

type AttemptResult = Result<Result<PassReport, SyncError>, Box<dyn Any + Send>>;

fn finish_attempt(
    state: &mut HostState,
    options: &HostOptions,
    work_id: WorkId,
    result: Option<AttemptResult>,
) {
    let Some(record) = state.records.get_mut(&work_id) else {
        return;
    };

    let result = match result {
        None => {
            // in-flight transfer abandoned; the remote side is not cleaned up
            info!("work cancelled during pass");
            record.finish(WorkState::Cancelled);
            return;
        }
        Some(Err(panic)) => {
            let reason = format!("pass panicked: {}", panic_message(panic.as_ref()));
            error!(reason = %reason, "work failed");
            record.record_pass(PassOutcome::HardFailureNoRetry, None, Some(reason));
            record.finish(WorkState::Failed);
            return;
        }
        Some(Ok(result)) => result,
    };

    let outcome = PassOutcome::of(&result);
    let (report, error) = match result {
        Ok(report) => (Some(report), None),
        Err(err) => (None, Some(err.to_string())),
    };
    record.record_pass(outcome, report, error);

    match options.decider.decide(record, outcome) {
        Decision::Finish => {
            info!(?outcome, "work succeeded");
            record.finish(WorkState::Succeeded);
        }
        Decision::GiveUp { reason } => {
            warn!(?outcome, reason = %reason, "work failed");
            record.finish(WorkState::Failed);
        }
        Decision::Retry { delay, reason } => match Instant::now().checked_add(delay) {
            Some(next_run_at) => {
                info!(?outcome, reason = %reason, ?delay, "retry scheduled");
                record.schedule_retry(next_run_at);
                state.scheduled.push(ScheduledWork {
                    next_run_at,
                    work_id,
                });
            }
            None => {
                warn!(?outcome, ?delay, "retry delay out of range, giving up");
                record.finish(WorkState::Failed);
            }
        },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FolderId, LocalId, PassReport, PassScope, SyncError};
    use crate::ports::{SystemClock, UlidGenerator};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    /// Plays back scripted pass results, then succeeds forever.
    struct ScriptedRunner {
        script: std::sync::Mutex<VecDeque<Result<PassOutcome, SyncError>>>,
        calls: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedRunner {
        fn new(script: Vec<Result<PassOutcome, SyncError>>) -> Arc<Self> {
            Self::with_delay(script, Duration::ZERO)
        }

        fn with_delay(script: Vec<Result<PassOutcome, SyncError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: std::sync::Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl PassRunner for ScriptedRunner {
        async fn run(&self, scope: &PassScope) -> Result<PassReport, SyncError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            let now_running = self.running.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            self.max_running.fetch_max(now_running, AtomicOrdering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.running.fetch_sub(1, AtomicOrdering::SeqCst);

            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(PassOutcome::AllSucceeded));
            next.map(|outcome| PassReport {
                pass_id: crate::domain::PassId::from_ulid(ulid::Ulid::new()),
                scope: scope.clone(),
                folder_id: FolderId::new("f"),
                started_at: Utc::now(),
                finished_at: Utc::now(),
                candidates: 0,
                transfers: vec![],
                outcome,
            })
        }
    }

    /// Panics on the first `panics` passes, then succeeds.
    struct PanickingRunner {
        panics: AtomicUsize,
    }

    #[async_trait]
    impl PassRunner for PanickingRunner {
        async fn run(&self, scope: &PassScope) -> Result<PassReport, SyncError> {
            let left = self.panics.load(AtomicOrdering::SeqCst);
            if left > 0 {
                self.panics.store(left - 1, AtomicOrdering::SeqCst);
                panic!("catalog index out of bounds");
            }
            Ok(PassReport {
                pass_id: crate::domain::PassId::from_ulid(ulid::Ulid::new()),
                scope: scope.clone(),
                folder_id: FolderId::new("f"),
                started_at: Utc::now(),
                finished_at: Utc::now(),
                candidates: 0,
                transfers: vec![],
                outcome: PassOutcome::AllSucceeded,
            })
        }
    }

    /// Always asks for a retry further away than the clock can represent.
    struct FarFutureDecider;

    impl Decider for FarFutureDecider {
        fn decide(&self, _work: &WorkRecord, _outcome: PassOutcome) -> Decision {
            Decision::Retry {
                delay: Duration::MAX,
                reason: "later".to_string(),
            }
        }
    }

    fn host(runner: Arc<ScriptedRunner>, max_attempts: u32) -> SyncHost {
        SyncHost::spawn(
            runner,
            Arc::new(UlidGenerator::new(SystemClock)),
            HostOptions {
                max_attempts,
                decider: Arc::new(DefaultDecider::default()),
            },
        )
    }

    #[tokio::test]
    async fn successful_pass_finishes_work() {
        let runner = ScriptedRunner::new(vec![]);
        let host = host(runner.clone(), 5);

        let handle = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.state, WorkState::Succeeded);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.outcome, Some(PassOutcome::AllSucceeded));
        assert!(report.last_report.is_some());
        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failure_is_retried_with_backoff() {
        let runner = ScriptedRunner::new(vec![
            Ok(PassOutcome::PartialFailureRetry),
            Ok(PassOutcome::PartialFailureRetry),
        ]);
        let host = host(runner.clone(), 5);
        let started = Instant::now();

        let report = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.state, WorkState::Succeeded);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.history.len(), 3);
        // 30s + 60s
        assert!(started.elapsed() >= Duration::from_secs(90));
        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_at_max_attempts() {
        let runner = ScriptedRunner::new(vec![Ok(PassOutcome::PartialFailureRetry); 10]);
        let host = host(runner.clone(), 3);

        let report = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.state, WorkState::Failed);
        assert_eq!(report.outcome, Some(PassOutcome::PartialFailureRetry));
        assert_eq!(runner.calls(), 3);
        host.shutdown().await;
    }

    #[tokio::test]
    async fn hard_failure_is_not_retried() {
        let runner = ScriptedRunner::new(vec![Err(SyncError::Configuration("none".into()))]);
        let host = host(runner.clone(), 5);

        let report = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.state, WorkState::Failed);
        assert_eq!(report.outcome, Some(PassOutcome::HardFailureNoRetry));
        assert_eq!(runner.calls(), 1);
        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keep_joins_the_active_work() {
        let runner = ScriptedRunner::with_delay(vec![], Duration::from_secs(5));
        let host = host(runner.clone(), 5);

        let first = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        let second = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        assert_eq!(first.work_id(), second.work_id());

        let (a, b) = tokio::join!(first.wait(), second.wait());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(runner.calls(), 1);
        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn replace_cancels_the_running_pass() {
        let runner = ScriptedRunner::with_delay(vec![], Duration::from_secs(5));
        let host = host(runner.clone(), 5);

        let first = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        // let the worker pick it up
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = host
            .submit(WorkRequest::sync_all(), ExistingWork::Replace)
            .await
            .unwrap();
        assert_ne!(first.work_id(), second.work_id());

        assert_eq!(first.wait().await.unwrap().state, WorkState::Cancelled);
        assert_eq!(second.wait().await.unwrap().state, WorkState::Succeeded);
        assert_eq!(runner.calls(), 2);
        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_names_run_one_after_another() {
        let runner = ScriptedRunner::with_delay(vec![], Duration::from_secs(2));
        let host = host(runner.clone(), 5);

        let a = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        let b = host
            .submit(WorkRequest::upload(LocalId::new("7")), ExistingWork::Keep)
            .await
            .unwrap();
        assert_eq!(b.name(), "upload:7");

        a.wait().await.unwrap();
        b.wait().await.unwrap();
        assert_eq!(runner.max_running.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(host.counts().await.succeeded, 2);
        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_scheduled_retry() {
        let runner = ScriptedRunner::new(vec![Ok(PassOutcome::PartialFailureRetry)]);
        let host = host(runner.clone(), 5);

        let handle = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            host.status("sync-all").await.unwrap().state,
            WorkState::RetryScheduled
        );

        assert!(host.cancel("sync-all").await);
        assert!(!host.cancel("sync-all").await);
        assert_eq!(handle.wait().await.unwrap().state, WorkState::Cancelled);
        assert_eq!(runner.calls(), 1);
        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_running_and_drops_queued_work() {
        let runner = ScriptedRunner::with_delay(vec![], Duration::from_secs(5));
        let host = host(runner.clone(), 5);

        let running = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        let queued = host
            .submit(WorkRequest::upload(LocalId::new("7")), ExistingWork::Keep)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        host.shutdown().await;

        assert_eq!(running.wait().await.unwrap().state, WorkState::Cancelled);
        assert_eq!(queued.wait().await, Err(HostError::ShutDown));
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn panicking_pass_fails_the_work_and_keeps_the_host_alive() {
        let runner = Arc::new(PanickingRunner {
            panics: AtomicUsize::new(1),
        });
        let host = SyncHost::spawn(
            runner,
            Arc::new(UlidGenerator::new(SystemClock)),
            HostOptions::default(),
        );

        let first = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        let first_id = first.work_id();
        let report = first.wait().await.unwrap();
        assert_eq!(report.state, WorkState::Failed);
        assert_eq!(report.outcome, Some(PassOutcome::HardFailureNoRetry));
        let error = report.history.last().unwrap().error.as_deref().unwrap();
        assert!(error.contains("catalog index out of bounds"), "{error}");

        let status = host.status("sync-all").await.unwrap();
        assert_eq!(status.state, WorkState::Failed);

        // the worker is still serving
        let second = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        assert_ne!(second.work_id(), first_id);
        assert_eq!(second.wait().await.unwrap().state, WorkState::Succeeded);
        host.shutdown().await;
    }

    #[tokio::test]
    async fn unrepresentable_retry_delay_gives_up() {
        let runner = ScriptedRunner::new(vec![Ok(PassOutcome::PartialFailureRetry)]);
        let host = SyncHost::spawn(
            runner.clone(),
            Arc::new(UlidGenerator::new(SystemClock)),
            HostOptions {
                max_attempts: 5,
                decider: Arc::new(FarFutureDecider),
            },
        );

        let report = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.state, WorkState::Failed);
        assert_eq!(runner.calls(), 1);
        host.shutdown().await;
    }

    #[tokio::test]
    async fn finished_work_keeps_only_the_latest_record_per_name() {
        let runner = ScriptedRunner::new(vec![]);
        let host = host(runner.clone(), 5);

        let mut last = None;
        for _ in 0..3 {
            let handle = host
                .submit(WorkRequest::sync_all(), ExistingWork::Keep)
                .await
                .unwrap();
            let work_id = handle.work_id();
            handle.wait().await.unwrap();
            last = Some(work_id);
        }
        host.submit(WorkRequest::upload(LocalId::new("7")), ExistingWork::Keep)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        let counts = host.counts().await;
        assert_eq!(counts.succeeded, 2);
        assert_eq!(counts.active(), 0);
        assert_eq!(host.status("sync-all").await.unwrap().work_id, last.unwrap());
        assert_eq!(runner.calls(), 4);
        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_work_is_dropped_once_cancelled() {
        let runner = ScriptedRunner::with_delay(vec![], Duration::from_secs(5));
        let host = host(runner.clone(), 5);

        let first = host
            .submit(WorkRequest::sync_all(), ExistingWork::Keep)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = host
            .submit(WorkRequest::sync_all(), ExistingWork::Replace)
            .await
            .unwrap();

        assert_eq!(first.wait().await.unwrap().state, WorkState::Cancelled);
        assert_eq!(second.wait().await.unwrap().state, WorkState::Succeeded);
        let counts = host.counts().await;
        assert_eq!(counts.cancelled, 0);
        assert_eq!(counts.succeeded, 1);
        host.shutdown().await;
    }
}
