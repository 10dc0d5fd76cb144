//! Playback Scheduler - drives one surface's session through its catalog
//!
//! ## Run Lifecycle
//!
//! ```text
//! start() ──► session Running, step 0 Processing ──► spawn driver
//!                                                      │
//!        ┌─────────────────────────────────────────────┘
//!        ▼
//!   select! { cancel token │ overall deadline │ pacer.wait(step) }
//!        │                                        │
//!   on_cancelled, Cancelled outcome       complete step, merge, notify,
//!                                          begin next step or finish
//! ```
//!
//! Session state lives behind a mutex that is never held across an await.
//! Observer callbacks run with the mutex held, which is what makes
//! cancellation final: once `cancel()` has returned, no step notification
//! for that run can follow. Observers therefore must not call back into the
//! scheduler.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::observer::{EventContext, PlaybackObserver};
use super::pacer::{Pacer, RealtimePacer};
use super::session::PlaybackSession;
use super::PlaybackError;
use crate::catalog::{Catalog, CatalogRegistry};
use crate::types::{AnalysisResult, CancelReason, PlaybackOutcome, PlaybackStatus, SessionSnapshot, Timeline};

// ============================================================================
// Run Handle
// ============================================================================

/// Awaitable outcome of one started run.
#[derive(Debug)]
pub struct RunHandle {
    session_id: Uuid,
    outcome: oneshot::Receiver<PlaybackOutcome>,
}

impl RunHandle {
    pub(crate) fn new(session_id: Uuid, outcome: oneshot::Receiver<PlaybackOutcome>) -> Self {
        Self {
            session_id,
            outcome,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Wait for the run to end. A driver that vanished without reporting
    /// (runtime shutdown) reads as `Cancelled(Aborted)`.
    pub async fn finished(self) -> PlaybackOutcome {
        self.outcome
            .await
            .unwrap_or(PlaybackOutcome::Cancelled(CancelReason::Aborted))
    }
}

// ============================================================================
// Shared State
// ============================================================================

/// Cancellation handle for one run. The first reason recorded wins.
#[derive(Debug, Clone)]
struct RunControl {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl RunControl {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
        }
    }

    fn cancel(&self, reason: CancelReason) -> CancelReason {
        let recorded = *self.reason.get_or_init(|| reason);
        self.token.cancel();
        recorded
    }

    fn reason(&self) -> CancelReason {
        self.reason.get().copied().unwrap_or(CancelReason::Aborted)
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    session: Option<PlaybackSession>,
    control: Option<RunControl>,
}

impl SchedulerState {
    /// The session, if it is still the one started with `id`.
    fn session_mut(&mut self, id: Uuid) -> Option<&mut PlaybackSession> {
        self.session.as_mut().filter(|s| s.id() == id)
    }
}

fn lock(state: &Mutex<SchedulerState>) -> MutexGuard<'_, SchedulerState> {
    state.lock().unwrap_or_else(|poisoned| {
        warn!("Scheduler state lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

type Observers = Arc<Vec<Arc<dyn PlaybackObserver>>>;

// ============================================================================
// Scheduler
// ============================================================================

/// Owns the playback session of one surface timeline.
///
/// Dropping the scheduler tears down any run in flight.
pub struct PlaybackScheduler {
    surface: String,
    timeline: Timeline,
    catalogs: Arc<CatalogRegistry>,
    pacer: Arc<dyn Pacer>,
    observers: Observers,
    timeout: Option<Duration>,
    state: Arc<Mutex<SchedulerState>>,
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("surface", &self.surface)
            .field("timeline", &self.timeline)
            .field("observers", &self.observers.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PlaybackScheduler {
    pub fn new(surface: impl Into<String>, catalogs: Arc<CatalogRegistry>) -> Self {
        Self {
            surface: surface.into(),
            timeline: Timeline::Main,
            catalogs,
            pacer: Arc::new(RealtimePacer::default()),
            observers: Arc::new(Vec::new()),
            timeout: None,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PlaybackObserver>) -> Self {
        Arc::make_mut(&mut self.observers).push(observer);
        self
    }

    pub fn with_observers(mut self, observers: &[Arc<dyn PlaybackObserver>]) -> Self {
        Arc::make_mut(&mut self.observers).extend(observers.iter().cloned());
        self
    }

    /// Ceiling on the total run time; exceeding it cancels with `TimedOut`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn timeline(&self) -> Timeline {
        self.timeline
    }

    /// Look up `subject_id` and start playing it.
    pub fn start(&self, subject_id: &str) -> Result<RunHandle, PlaybackError> {
        let catalog = self.catalogs.get_catalog(subject_id)?;
        self.start_catalog(catalog)
    }

    /// Start playing `catalog`, replacing any finished session.
    ///
    /// Fails with `AlreadyRunning` while a session is running. Must be called
    /// from within a Tokio runtime.
    pub fn start_catalog(&self, catalog: Arc<Catalog>) -> Result<RunHandle, PlaybackError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?;

        let mut state = lock(&self.state);
        if state.session.as_ref().is_some_and(PlaybackSession::is_running) {
            return Err(PlaybackError::AlreadyRunning {
                surface: self.surface.clone(),
            });
        }
        if let Some(previous) = state.control.take() {
            previous.token.cancel();
        }

        let mut session =
            PlaybackSession::new(self.surface.clone(), self.timeline, Arc::clone(&catalog));
        session.start();
        let ctx = EventContext {
            surface: self.surface.clone(),
            timeline: self.timeline,
            session_id: session.id(),
            catalog_id: catalog.id().to_string(),
        };
        let total = catalog.len();
        if let Some(first) = session.begin_step(0) {
            for observer in self.observers.iter() {
                observer.on_start(&ctx, total);
            }
            for observer in self.observers.iter() {
                observer.on_step_start(&ctx, first, 0, total);
            }
        }

        let session_id = session.id();
        let control = RunControl::new();
        state.session = Some(session);
        state.control = Some(control.clone());
        drop(state);

        debug!(
            surface = %self.surface,
            timeline = %self.timeline,
            catalog = %catalog.id(),
            steps = total,
            expected_ms = catalog.expected_total_duration_ms(),
            session = %session_id,
            "Playback started"
        );

        let (tx, rx) = oneshot::channel();
        let driver = Driver {
            ctx,
            catalog,
            state: Arc::clone(&self.state),
            control,
            pacer: Arc::clone(&self.pacer),
            observers: Arc::clone(&self.observers),
            timeout: self.timeout,
            settled: false,
        };
        runtime.spawn(async move {
            let outcome = driver.run().await;
            // Receiver dropped means nobody is waiting for this run.
            let _ = tx.send(outcome);
        });

        Ok(RunHandle::new(session_id, rx))
    }

    /// Cancel the running session at the caller's request.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::Requested)
    }

    /// Cancel because the owning surface is going away.
    pub fn teardown(&self) -> bool {
        self.cancel_with(CancelReason::Teardown)
    }

    /// Move a running session to `Cancelled` and interrupt its pending wait.
    /// Returns false if nothing was running.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        let mut state = lock(&self.state);
        let SchedulerState { session, control } = &mut *state;
        match (session.as_mut(), control.as_ref()) {
            (Some(session), Some(control)) if session.is_running() => {
                let reason = control.cancel(reason);
                session.cancel(reason);
                debug!(surface = %self.surface, timeline = %self.timeline, %reason, "Cancel requested");
                true
            }
            _ => false,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        lock(&self.state)
            .session
            .as_ref()
            .map_or(PlaybackStatus::Idle, PlaybackSession::status)
    }

    pub fn is_running(&self) -> bool {
        self.status() == PlaybackStatus::Running
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        lock(&self.state).session.as_ref().map(PlaybackSession::snapshot)
    }

    pub fn progress_percent(&self) -> f64 {
        lock(&self.state)
            .session
            .as_ref()
            .map_or(0.0, PlaybackSession::progress_percent)
    }

    /// Result folded so far; empty before the first run.
    pub fn accumulated_result(&self) -> AnalysisResult {
        lock(&self.state)
            .session
            .as_ref()
            .map(|s| s.accumulated_result().clone())
            .unwrap_or_default()
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        if self.teardown() {
            debug!(surface = %self.surface, timeline = %self.timeline, "Scheduler dropped mid-run");
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

enum Interrupt {
    Cancelled,
    TimedOut,
}

/// Task side of one run. Holds its own copy of everything it needs so the
/// scheduler can be dropped while it winds down.
///
/// A driver dropped before it settles (panic, task abort, runtime shutdown)
/// cancels its session with `Aborted` on the way out, so the surface never
/// stays `Running` with nothing driving it.
struct Driver {
    ctx: EventContext,
    catalog: Arc<Catalog>,
    state: Arc<Mutex<SchedulerState>>,
    control: RunControl,
    pacer: Arc<dyn Pacer>,
    observers: Observers,
    timeout: Option<Duration>,
    settled: bool,
}

impl Driver {
    async fn run(mut self) -> PlaybackOutcome {
        let outcome = self.play().await;
        self.settled = true;
        outcome
    }

    /// Deadline for the whole run. A ceiling too far out to represent is
    /// treated as no ceiling.
    fn deadline(&self) -> Option<Instant> {
        let timeout = self.timeout?;
        let deadline = Instant::now().checked_add(timeout);
        if deadline.is_none() {
            warn!(
                surface = %self.ctx.surface,
                timeline = %self.ctx.timeline,
                timeout_secs = timeout.as_secs(),
                "Session timeout out of range, running without a deadline"
            );
        }
        deadline
    }

    async fn play(&self) -> PlaybackOutcome {
        let total = self.catalog.len();
        let session_id = self.ctx.session_id;
        let deadline = self.deadline();
        let expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        for (index, step) in self.catalog.steps().iter().enumerate() {
            if index > 0 {
                let mut state = lock(&self.state);
                let Some(session) = state.session_mut(session_id) else {
                    drop(state);
                    return self.conclude_cancelled(None);
                };
                match session.begin_step(index) {
                    Some(step) => {
                        for observer in self.observers.iter() {
                            observer.on_step_start(&self.ctx, step, index, total);
                        }
                    }
                    None => {
                        drop(state);
                        return self.conclude_cancelled(None);
                    }
                }
            }

            debug!(
                surface = %self.ctx.surface,
                timeline = %self.ctx.timeline,
                step = %step.id,
                wait_ms = u64::try_from(self.pacer.planned(step).as_millis()).unwrap_or(u64::MAX),
                "Waiting on step"
            );

            let interrupt = tokio::select! {
                biased;
                () = self.control.token.cancelled() => Some(Interrupt::Cancelled),
                () = &mut expiry => Some(Interrupt::TimedOut),
                () = self.pacer.wait(step) => None,
            };
            match interrupt {
                Some(Interrupt::Cancelled) => return self.conclude_cancelled(None),
                Some(Interrupt::TimedOut) => {
                    return self.conclude_cancelled(Some(CancelReason::TimedOut))
                }
                None => {}
            }

            let mut state = lock(&self.state);
            let Some(partial) = state
                .session_mut(session_id)
                .and_then(|session| session.complete_step(index))
            else {
                drop(state);
                return self.conclude_cancelled(None);
            };
            for observer in self.observers.iter() {
                observer.on_step_complete(&self.ctx, step, index, total, &partial);
            }
        }

        let mut state = lock(&self.state);
        let Some(result) = state.session_mut(session_id).and_then(PlaybackSession::finish) else {
            drop(state);
            return self.conclude_cancelled(None);
        };
        for observer in self.observers.iter() {
            observer.on_complete(&self.ctx, &result);
        }
        drop(state);

        debug!(
            surface = %self.ctx.surface,
            timeline = %self.ctx.timeline,
            findings = result.findings.len(),
            risks = result.risks.len(),
            "Playback complete"
        );
        PlaybackOutcome::Completed(result)
    }

    /// Settle the run as cancelled and notify once. `own` is set when the
    /// driver itself decided to stop (timeout); otherwise the reason was
    /// recorded by whoever cancelled.
    fn conclude_cancelled(&self, own: Option<CancelReason>) -> PlaybackOutcome {
        let reason = match own {
            Some(reason) => self.control.cancel(reason),
            None => self.control.reason(),
        };

        let mut state = lock(&self.state);
        if let Some(session) = state.session_mut(self.ctx.session_id) {
            session.cancel(reason);
        }
        for observer in self.observers.iter() {
            observer.on_cancelled(&self.ctx, reason);
        }
        drop(state);

        debug!(
            surface = %self.ctx.surface,
            timeline = %self.ctx.timeline,
            %reason,
            "Playback cancelled"
        );
        PlaybackOutcome::Cancelled(reason)
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let reason = self.control.cancel(CancelReason::Aborted);
        let mut state = lock(&self.state);
        let Some(session) = state.session_mut(self.ctx.session_id) else {
            return;
        };
        if !session.cancel(reason) {
            return;
        }
        for observer in self.observers.iter() {
            observer.on_cancelled(&self.ctx, reason);
        }
        drop(state);

        warn!(
            surface = %self.ctx.surface,
            timeline = %self.ctx.timeline,
            %reason,
            "Playback driver exited without settling"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::pacer::ImmediatePacer;
    use crate::types::{ResultPayload, Step};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        events: StdMutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl PlaybackObserver for Recorder {
        fn on_step_start(&self, _ctx: &EventContext, step: &Step, _index: usize, _total: usize) {
            self.events.lock().unwrap().push(format!("start:{}", step.id));
        }

        fn on_step_complete(
            &self,
            _ctx: &EventContext,
            step: &Step,
            _index: usize,
            _total: usize,
            _partial: &AnalysisResult,
        ) {
            self.events.lock().unwrap().push(format!("done:{}", step.id));
        }

        fn on_complete(&self, _ctx: &EventContext, _result: &AnalysisResult) {
            self.events.lock().unwrap().push("complete".into());
        }

        fn on_cancelled(&self, _ctx: &EventContext, reason: CancelReason) {
            self.events.lock().unwrap().push(format!("cancelled:{reason}"));
        }
    }

    fn registry() -> Arc<CatalogRegistry> {
        let mut registry = CatalogRegistry::new();
        registry.insert_catalog(
            Catalog::new(
                "two",
                "Two",
                vec![
                    Step::new("a", "A", 100).with_payload(ResultPayload::findings(["x"])),
                    Step::new("b", "B", 100).with_payload(ResultPayload::findings(["y"])),
                ],
                None,
            )
            .unwrap(),
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_unknown_subject_is_an_error() {
        let scheduler = PlaybackScheduler::new("viewer", registry());
        let err = scheduler.start("missing").unwrap_err();
        assert!(err.is_unknown_subject());
        assert_eq!(scheduler.status(), PlaybackStatus::Idle);
    }

    #[tokio::test]
    async fn test_immediate_run_completes_in_order() {
        let recorder = Arc::new(Recorder::default());
        let scheduler = PlaybackScheduler::new("viewer", registry())
            .with_pacer(Arc::new(ImmediatePacer))
            .with_observer(recorder.clone());
        let outcome = scheduler.start("two").unwrap().finished().await;

        assert_eq!(
            outcome.result().map(|r| r.findings.clone()),
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(
            recorder.events(),
            vec!["start:a", "done:a", "start:b", "done:b", "complete"]
        );
        assert_eq!(scheduler.status(), PlaybackStatus::Complete);
        assert_eq!(scheduler.progress_percent(), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_transitions() {
        let recorder = Arc::new(Recorder::default());
        let scheduler = PlaybackScheduler::new("viewer", registry()).with_observer(recorder.clone());
        let handle = scheduler.start("two").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel(), "second cancel is a no-op");
        assert_eq!(scheduler.status(), PlaybackStatus::Cancelled);

        let outcome = handle.finished().await;
        assert_eq!(outcome, PlaybackOutcome::Cancelled(CancelReason::Requested));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(recorder.events(), vec!["start:a", "cancelled:requested"]);
        assert!(scheduler.accumulated_result().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_forces_cancel() {
        let scheduler = PlaybackScheduler::new("viewer", registry())
            .with_timeout(Some(Duration::from_millis(150)));
        let outcome = scheduler.start("two").unwrap().finished().await;

        assert_eq!(outcome, PlaybackOutcome::Cancelled(CancelReason::TimedOut));
        let snapshot = scheduler.snapshot().unwrap();
        assert_eq!(snapshot.status, PlaybackStatus::Cancelled);
        assert_eq!(snapshot.completed_steps, 1);
        assert_eq!(snapshot.elapsed_ms, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_tears_down_run() {
        let recorder = Arc::new(Recorder::default());
        let scheduler = PlaybackScheduler::new("viewer", registry()).with_observer(recorder.clone());
        let handle = scheduler.start("two").unwrap();
        drop(scheduler);

        assert_eq!(
            handle.finished().await,
            PlaybackOutcome::Cancelled(CancelReason::Teardown)
        );
        assert_eq!(recorder.events().last().map(String::as_str), Some("cancelled:surface torn down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_timeout_means_no_deadline() {
        let config =
            crate::config::AppConfig::from_toml_str("[playback]\nsession_timeout_secs = 9223372036854775807\n")
                .unwrap();
        let scheduler = PlaybackScheduler::new("viewer", registry())
            .with_timeout(config.playback.session_timeout());
        let outcome = scheduler.start("two").unwrap().finished().await;

        assert!(outcome.is_completed(), "{outcome:?}");
        assert_eq!(scheduler.status(), PlaybackStatus::Complete);
        assert!(scheduler.start("two").is_ok());
    }

    /// Panics on the first step completion, killing the driver task.
    struct Explosive;

    impl PlaybackObserver for Explosive {
        fn on_step_complete(
            &self,
            _ctx: &EventContext,
            _step: &Step,
            _index: usize,
            _total: usize,
            _partial: &AnalysisResult,
        ) {
            panic!("observer failure");
        }
    }

    #[tokio::test]
    async fn test_driver_exit_settles_session_as_aborted() {
        let recorder = Arc::new(Recorder::default());
        let scheduler = PlaybackScheduler::new("viewer", registry())
            .with_pacer(Arc::new(ImmediatePacer))
            .with_observer(Arc::new(Explosive))
            .with_observer(recorder.clone());
        let outcome = scheduler.start("two").unwrap().finished().await;

        assert_eq!(outcome, PlaybackOutcome::Cancelled(CancelReason::Aborted));
        let snapshot = scheduler.snapshot().unwrap();
        assert_eq!(snapshot.status, PlaybackStatus::Cancelled);
        assert_eq!(snapshot.cancel_reason, Some(CancelReason::Aborted));
        assert_eq!(recorder.events(), vec!["start:a", "cancelled:aborted"]);

        // The surface is free again.
        assert!(!scheduler.is_running());
        assert!(scheduler.start("two").is_ok());
    }

    #[test]
    fn test_start_outside_runtime_is_rejected() {
        let scheduler = PlaybackScheduler::new("viewer", registry());
        assert!(matches!(
            scheduler.start("two"),
            Err(PlaybackError::NoRuntime)
        ));
    }
}
