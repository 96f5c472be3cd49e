//! Poll scheduler for a running study task
//!
//! This module drives the three read endpoints on a fixed cadence and folds
//! their results into a [`MonitorState`].
//!
//! ## Architecture
//!
//! - One driver task owns the timer and the state. It is the only writer; the
//!   state is published through a `tokio::sync::watch` channel after every
//!   change so readers never see a half-applied update.
//! - On each tick the driver spawns one fetch per kind (status, details,
//!   logs). A kind whose previous fetch is still running is skipped for that
//!   tick rather than queued, so a slow endpoint never delays the others.
//! - Fetches report back over a channel. Failures are logged and counted and
//!   leave the slot untouched; the next tick is the retry.
//! - The loop stops by itself only after a successful status fetch reports a
//!   terminal status. Fetches already in flight for that tick are still
//!   applied, then the driver exits.
//! - [`MonitorHandle::stop`] (or dropping the handle) ends the session: the
//!   timer is cancelled at once and any result that arrives later is
//!   discarded via the [`SessionToken`].
//!
//! Binaries run this on a current-thread runtime, so all of the above is
//! cooperative scheduling on a single thread.

mod session;
mod state;

pub use session::SessionToken;
pub use state::{FetchFailures, FetchKind, MonitorState, PollPhase};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::types::{DetailSnapshot, LogEntry, StatusSnapshot, TaskId};

/// Default time between poll ticks
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// Read side of the study server as seen by the scheduler.
///
/// Implemented by [`crate::client::TaskClient`]; tests plug in scripted sources.
pub trait TaskSource: Send + Sync + 'static {
    fn fetch_status(
        &self,
        task_id: &TaskId,
    ) -> impl Future<Output = Result<StatusSnapshot>> + Send;

    fn fetch_details(
        &self,
        task_id: &TaskId,
    ) -> impl Future<Output = Result<DetailSnapshot>> + Send;

    /// Entries emitted since the previous call
    fn fetch_logs(&self, task_id: &TaskId) -> impl Future<Output = Result<Vec<LogEntry>>> + Send;
}

/// Starts monitoring sessions against a [`TaskSource`].
pub struct Monitor<S> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: TaskSource> Monitor<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self::from_arc(Arc::new(source), interval)
    }

    pub fn from_arc(source: Arc<S>, interval: Duration) -> Self {
        Self { source, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Begin polling `task_id`. The first tick fires immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, task_id: TaskId) -> MonitorHandle {
        let session = SessionToken::new();
        let (state_tx, state_rx) = watch::channel(MonitorState::new(task_id.clone()));
        let (stop_tx, stop_rx) = oneshot::channel();

        let driver = Driver {
            source: Arc::clone(&self.source),
            task_id: task_id.clone(),
            session: session.clone(),
            interval: self.interval,
            state: state_tx,
        };
        let join = tokio::spawn(driver.run(stop_rx));

        MonitorHandle {
            task_id,
            session,
            stop_tx: Some(stop_tx),
            state_rx,
            join: Some(join),
        }
    }
}

/// Caller's side of a monitoring session.
///
/// Dropping the handle stops the session.
pub struct MonitorHandle {
    task_id: TaskId,
    session: SessionToken,
    stop_tx: Option<oneshot::Sender<()>>,
    state_rx: watch::Receiver<MonitorState>,
    join: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// A receiver that is notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state_rx.clone()
    }

    /// Copy of the current state.
    pub fn state(&self) -> MonitorState {
        self.state_rx.borrow().clone()
    }

    /// Whether the driver task is still alive.
    pub fn is_running(&self) -> bool {
        self.join.as_ref().map_or(false, |join| !join.is_finished())
    }

    /// Tear the session down. Idempotent.
    ///
    /// The liveness flag is cleared before the driver is signalled, so a
    /// result already queued for the driver is discarded as well.
    pub fn stop(&mut self) {
        if self.session.end() && self.is_running() {
            tracing::info!(task_id = %self.task_id, "Monitoring stopped by caller");
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    /// Wait for the driver task to exit (after a terminal status or `stop`).
    pub async fn finished(&mut self) {
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!(task_id = %self.task_id, error = %e, "Monitor driver task failed");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Result of one fetch, tagged with the session it was issued for.
struct FetchOutcome {
    session: SessionToken,
    result: FetchResult,
}

enum FetchResult {
    Status(Result<StatusSnapshot>),
    Details(Result<DetailSnapshot>),
    Logs(Result<Vec<LogEntry>>),
}

impl FetchResult {
    fn kind(&self) -> FetchKind {
        match self {
            FetchResult::Status(_) => FetchKind::Status,
            FetchResult::Details(_) => FetchKind::Details,
            FetchResult::Logs(_) => FetchKind::Logs,
        }
    }
}

/// Which kinds currently have a fetch outstanding.
#[derive(Debug, Default)]
struct InFlight {
    status: bool,
    details: bool,
    logs: bool,
}

impl InFlight {
    fn slot(&mut self, kind: FetchKind) -> &mut bool {
        match kind {
            FetchKind::Status => &mut self.status,
            FetchKind::Details => &mut self.details,
            FetchKind::Logs => &mut self.logs,
        }
    }

    fn is_idle(&self) -> bool {
        !(self.status || self.details || self.logs)
    }
}

struct Driver<S> {
    source: Arc<S>,
    task_id: TaskId,
    session: SessionToken,
    interval: Duration,
    state: watch::Sender<MonitorState>,
}

impl<S: TaskSource> Driver<S> {
    async fn run(self, mut stop_rx: oneshot::Receiver<()>) {
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<FetchOutcome>();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight = InFlight::default();
        let mut polling = true;

        tracing::info!(
            task_id = %self.task_id,
            interval_ms = self.interval.as_millis() as u64,
            "Monitoring started"
        );

        loop {
            if !polling && in_flight.is_idle() {
                break;
            }

            tokio::select! {
                biased;

                // A dropped sender means the handle went away: same as stop.
                _ = &mut stop_rx => {
                    self.session.end();
                    self.state.send_modify(|s| s.phase = PollPhase::Stopped);
                    tracing::debug!(task_id = %self.task_id, "Poll driver torn down");
                    return;
                }

                Some(outcome) = outcome_rx.recv() => {
                    *in_flight.slot(outcome.result.kind()) = false;
                    if self.apply(outcome) {
                        polling = false;
                    }
                }

                _ = ticker.tick(), if polling => {
                    self.issue_tick(&mut in_flight, &outcome_tx);
                }
            }
        }

        tracing::info!(task_id = %self.task_id, "Task reached a terminal state, polling finished");
    }

    /// Spawn a fetch for every kind that is not already in flight.
    fn issue_tick(&self, in_flight: &mut InFlight, outcome_tx: &mpsc::UnboundedSender<FetchOutcome>) {
        let mut issued = 0;
        for kind in FetchKind::ALL {
            let busy = in_flight.slot(kind);
            if *busy {
                tracing::debug!(task_id = %self.task_id, kind = %kind, "Previous fetch still in flight, skipping");
                continue;
            }
            *busy = true;
            self.spawn_fetch(kind, outcome_tx.clone());
            issued += 1;
        }

        if issued > 0 {
            self.state.send_modify(|s| s.ticks += 1);
        }
    }

    fn spawn_fetch(&self, kind: FetchKind, outcome_tx: mpsc::UnboundedSender<FetchOutcome>) {
        let source = Arc::clone(&self.source);
        let task_id = self.task_id.clone();
        let session = self.session.clone();

        tokio::spawn(async move {
            let result = match kind {
                FetchKind::Status => FetchResult::Status(source.fetch_status(&task_id).await),
                FetchKind::Details => FetchResult::Details(source.fetch_details(&task_id).await),
                FetchKind::Logs => FetchResult::Logs(source.fetch_logs(&task_id).await),
            };

            if !session.is_live() {
                tracing::debug!(task_id = %task_id, kind = %kind, "Session ended, discarding fetch result");
                return;
            }
            // The driver may have exited already; nothing to deliver to then.
            let _ = outcome_tx.send(FetchOutcome { session, result });
        });
    }

    /// Fold one fetch result into the state.
    ///
    /// Returns true when the result was a terminal status.
    fn apply(&self, outcome: FetchOutcome) -> bool {
        if !outcome.session.same_session(&self.session) || !outcome.session.is_live() {
            tracing::debug!(task_id = %self.task_id, "Dropping result from an ended session");
            return false;
        }

        match outcome.result {
            FetchResult::Status(Ok(snapshot)) => {
                let terminal = snapshot.status.is_terminal();
                if terminal {
                    tracing::info!(
                        task_id = %self.task_id,
                        status = %snapshot.status,
                        error = snapshot.error.as_deref().unwrap_or(""),
                        "Terminal status observed"
                    );
                }
                self.state.send_modify(|s| {
                    s.status = Some(snapshot);
                    if terminal {
                        s.phase = PollPhase::Finished;
                    }
                });
                terminal
            }
            FetchResult::Details(Ok(details)) => {
                self.state.send_modify(|s| s.details = Some(details));
                false
            }
            FetchResult::Logs(Ok(batch)) => {
                self.state.send_if_modified(|s| s.logs.append(batch) > 0);
                false
            }
            FetchResult::Status(Err(e)) => self.record_failure(FetchKind::Status, e),
            FetchResult::Details(Err(e)) => self.record_failure(FetchKind::Details, e),
            FetchResult::Logs(Err(e)) => self.record_failure(FetchKind::Logs, e),
        }
    }

    fn record_failure(&self, kind: FetchKind, error: Error) -> bool {
        tracing::warn!(
            task_id = %self.task_id,
            kind = %kind,
            transient = error.is_transient(),
            error = %error,
            "Fetch failed, keeping previous data"
        );
        self.state.send_modify(|s| s.failures.record(kind));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogLevel, TaskStatus};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const INTERVAL: Duration = Duration::from_millis(2000);

    fn status(status: TaskStatus, progress: i64, total: i64) -> StatusSnapshot {
        StatusSnapshot {
            status,
            progress,
            total,
            current_course: Some("Physics".to_string()),
            current_chapter: None,
            current_task: None,
            error: None,
            start_time: Some(1_700_000_000.0),
            stats: None,
        }
    }

    fn log(ts: f64, level: LogLevel, message: &str) -> LogEntry {
        LogEntry::new(ts, level, message)
    }

    fn failure() -> Error {
        Error::Request("connection reset".to_string())
    }

    /// Source that replays scripted results, one per call.
    ///
    /// An exhausted script yields a request error (status, details) or an
    /// empty batch (logs).
    #[derive(Default)]
    struct ScriptedSource {
        status: Mutex<VecDeque<Result<StatusSnapshot>>>,
        details: Mutex<VecDeque<Result<DetailSnapshot>>>,
        logs: Mutex<VecDeque<Result<Vec<LogEntry>>>>,
        details_delay: Duration,
        status_calls: AtomicUsize,
        details_calls: AtomicUsize,
        details_completed: AtomicUsize,
        logs_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn with_status(self, script: Vec<Result<StatusSnapshot>>) -> Self {
            *self.status.lock().unwrap() = script.into();
            self
        }

        fn with_details(self, script: Vec<Result<DetailSnapshot>>) -> Self {
            *self.details.lock().unwrap() = script.into();
            self
        }

        fn with_logs(self, script: Vec<Result<Vec<LogEntry>>>) -> Self {
            *self.logs.lock().unwrap() = script.into();
            self
        }

        fn with_details_delay(mut self, delay: Duration) -> Self {
            self.details_delay = delay;
            self
        }

        fn calls(&self) -> (usize, usize, usize) {
            (
                self.status_calls.load(Ordering::SeqCst),
                self.details_calls.load(Ordering::SeqCst),
                self.logs_calls.load(Ordering::SeqCst),
            )
        }
    }

    impl TaskSource for ScriptedSource {
        async fn fetch_status(&self, _task_id: &TaskId) -> Result<StatusSnapshot> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.status.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(failure()))
        }

        async fn fetch_details(&self, _task_id: &TaskId) -> Result<DetailSnapshot> {
            self.details_calls.fetch_add(1, Ordering::SeqCst);
            if !self.details_delay.is_zero() {
                tokio::time::sleep(self.details_delay).await;
            }
            self.details_completed.fetch_add(1, Ordering::SeqCst);
            let next = self.details.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(failure()))
        }

        async fn fetch_logs(&self, _task_id: &TaskId) -> Result<Vec<LogEntry>> {
            self.logs_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.logs.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn start(source: &Arc<ScriptedSource>) -> MonitorHandle {
        Monitor::from_arc(Arc::clone(source), INTERVAL).start(TaskId::from("alice_1700000000"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_status_stops_ticks_and_drains_same_tick() {
        let source = Arc::new(
            ScriptedSource::default()
                .with_status(vec![
                    Ok(status(TaskStatus::Running, 2, 5)),
                    Ok(status(TaskStatus::Running, 4, 5)),
                    Ok(status(TaskStatus::Completed, 5, 5)),
                ])
                .with_logs(vec![
                    Ok(vec![log(1000.0, LogLevel::Info, "ch1 done")]),
                    Err(failure()),
                    Ok(vec![log(1002.0, LogLevel::Success, "done")]),
                ]),
        );
        let mut handle = start(&source);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = handle.state();
        assert_eq!(state.ticks, 1);
        assert_eq!(state.status.as_ref().map(|s| s.progress), Some(2));

        tokio::time::sleep(Duration::from_secs(20)).await;
        handle.finished().await;

        let state = handle.state();
        assert_eq!(state.ticks, 3);
        assert_eq!(state.phase, PollPhase::Finished);
        assert_eq!(
            state.status.as_ref().map(|s| s.status),
            Some(TaskStatus::Completed)
        );
        assert_eq!(
            state.logs.entries(),
            &[
                log(1000.0, LogLevel::Info, "ch1 done"),
                log(1002.0, LogLevel::Success, "done"),
            ]
        );
        assert_eq!(state.failures.logs, 1);
        assert_eq!(source.calls(), (3, 3, 3));
        assert!(!handle.is_running());

        // No further fetches once terminal.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(source.calls(), (3, 3, 3));
        assert_eq!(handle.state().ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_is_terminal() {
        let mut failed = status(TaskStatus::Error, 1, 3);
        failed.error = Some("login failed".to_string());
        let source = Arc::new(ScriptedSource::default().with_status(vec![Ok(failed)]));
        let mut handle = start(&source);

        handle.finished().await;

        let state = handle.state();
        assert_eq!(state.ticks, 1);
        assert!(state.is_terminal());
        assert_eq!(
            state.status.and_then(|s| s.error).as_deref(),
            Some("login failed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_fetch_keeps_previous_snapshot() {
        crate::logging::init_test();
        let source = Arc::new(ScriptedSource::default().with_status(vec![
            Ok(status(TaskStatus::Running, 1, 5)),
            Err(failure()),
            Err(Error::Malformed {
                endpoint: "/task/alice_1700000000".to_string(),
                message: "envelope has no data".to_string(),
            }),
        ]));
        let handle = start(&source);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = handle.state().status;
        assert!(before.is_some());

        tokio::time::sleep(INTERVAL * 2).await;
        let after = handle.state();
        assert_eq!(after.ticks, 3);
        assert_eq!(after.status, before);
        assert_eq!(after.failures.status, 2);
        // A failed status fetch never stops polling.
        assert_eq!(after.phase, PollPhase::Polling);
        assert!(handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_keeps_polling() {
        let source = Arc::new(ScriptedSource::default().with_status(vec![
            Ok(status(TaskStatus::Unknown, 0, 0)),
            Ok(status(TaskStatus::Pending, 0, 0)),
        ]));
        let handle = start(&source);

        tokio::time::sleep(INTERVAL * 2 + Duration::from_millis(100)).await;
        assert_eq!(handle.state().ticks, 3);
        assert_eq!(handle.state().phase, PollPhase::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_failures_do_not_block_other_kinds() {
        let details = DetailSnapshot::default();
        let source = Arc::new(
            ScriptedSource::default()
                .with_status(vec![
                    Ok(status(TaskStatus::Running, 1, 5)),
                    Ok(status(TaskStatus::Running, 2, 5)),
                ])
                .with_details(vec![Ok(details.clone()), Ok(details.clone())])
                .with_logs(vec![Err(failure()), Err(failure())]),
        );
        let handle = start(&source);

        tokio::time::sleep(INTERVAL + Duration::from_millis(100)).await;
        let state = handle.state();
        assert_eq!(state.ticks, 2);
        assert_eq!(state.status.map(|s| s.progress), Some(2));
        assert_eq!(state.details, Some(details));
        assert!(state.logs.is_empty());
        assert_eq!(state.failures.logs, 2);
        assert_eq!(state.failures.status, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_kind_is_skipped_not_queued() {
        let source = Arc::new(
            ScriptedSource::default()
                .with_details(vec![
                    Ok(DetailSnapshot::default()),
                    Ok(DetailSnapshot::default()),
                ])
                .with_details_delay(Duration::from_secs(5)),
        );
        let handle = start(&source);

        // Ticks at 0s, 2s, 4s and 6s; details is busy from 0s to 5s.
        tokio::time::sleep(Duration::from_secs(7)).await;

        let (status_calls, details_calls, logs_calls) = source.calls();
        assert_eq!(status_calls, 4);
        assert_eq!(logs_calls, 4);
        assert_eq!(details_calls, 2);
        assert_eq!(handle.state().ticks, 4);
        assert!(handle.state().details.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_results() {
        let source = Arc::new(
            ScriptedSource::default()
                .with_status(vec![Ok(status(TaskStatus::Running, 1, 5))])
                .with_details(vec![Ok(DetailSnapshot::default())])
                .with_details_delay(Duration::from_secs(1)),
        );
        let mut handle = start(&source);

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        handle.finished().await;

        tokio::time::sleep(Duration::from_secs(10)).await;

        // The slow fetch was allowed to finish but its result was dropped.
        assert_eq!(source.details_completed.load(Ordering::SeqCst), 1);
        let state = handle.state();
        assert!(state.details.is_none());
        assert_eq!(state.phase, PollPhase::Stopped);
        assert_eq!(state.ticks, 1);
        assert_eq!(source.calls(), (1, 1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let source = Arc::new(ScriptedSource::default());
        let handle = start(&source);
        let mut rx = handle.subscribe();

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(handle);
        tokio::time::sleep(INTERVAL * 3).await;

        assert_eq!(source.calls(), (1, 1, 1));
        assert_eq!(rx.borrow_and_update().phase, PollPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_are_notified() {
        let source = Arc::new(
            ScriptedSource::default().with_status(vec![Ok(status(TaskStatus::Completed, 1, 1))]),
        );
        let handle = start(&source);
        let mut rx = handle.subscribe();

        loop {
            if rx.borrow_and_update().is_terminal() {
                break;
            }
            rx.changed().await.unwrap();
        }
        assert_eq!(rx.borrow().phase, PollPhase::Finished);
    }
}
