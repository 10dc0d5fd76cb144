//! Dual-AI playback: two independent timelines behind one join
//!
//! The extractor (GPT-4 Vision) and analyzer (Claude) timelines are separate
//! [`PlaybackScheduler`]s with their own catalogs, durations and results.
//! Neither knows about the other. A join task waits for both outcomes and
//! only then emits the combined `on_complete` on the `Joined` timeline.
//!
//! If either timeline is cancelled the join cancels its peer with
//! `PeerCancelled` and reports one joined cancellation carrying the
//! original reason.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use super::observer::{EventContext, PlaybackObserver};
use super::pacer::Pacer;
use super::scheduler::{PlaybackScheduler, RunHandle};
use super::session::progress;
use super::PlaybackError;
use crate::aggregator;
use crate::catalog::CatalogRegistry;
use crate::types::{
    AnalysisResult, CancelReason, PlaybackOutcome, PlaybackStatus, SessionSnapshot, Timeline,
};

/// Read-only view of a dual playback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DualSnapshot {
    pub session_id: Uuid,
    pub surface: String,
    pub subject_id: String,
    pub status: PlaybackStatus,
    pub progress_percent: f64,
    pub extractor: Option<SessionSnapshot>,
    pub analyzer: Option<SessionSnapshot>,
    /// Live combination of both partial results, extractor first
    pub combined_result: AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<CancelReason>,
}

#[derive(Debug, Default)]
struct JoinState {
    session_id: Option<Uuid>,
    subject_id: String,
    status: PlaybackStatus,
    final_result: Option<AnalysisResult>,
    cancel_reason: Option<CancelReason>,
}

impl JoinState {
    fn is_current(&self, id: Uuid) -> bool {
        self.session_id == Some(id)
    }
}

fn lock(state: &Mutex<JoinState>) -> MutexGuard<'_, JoinState> {
    state.lock().unwrap_or_else(|poisoned| {
        warn!("Join state lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Two schedulers and the join between them.
pub struct DualPlayback {
    surface: String,
    catalogs: Arc<CatalogRegistry>,
    extractor: Arc<PlaybackScheduler>,
    analyzer: Arc<PlaybackScheduler>,
    observers: Arc<Vec<Arc<dyn PlaybackObserver>>>,
    state: Arc<Mutex<JoinState>>,
}

impl std::fmt::Debug for DualPlayback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualPlayback")
            .field("surface", &self.surface)
            .field("extractor", &self.extractor)
            .field("analyzer", &self.analyzer)
            .finish_non_exhaustive()
    }
}

impl DualPlayback {
    pub fn new(
        surface: impl Into<String>,
        catalogs: Arc<CatalogRegistry>,
        pacer: Arc<dyn Pacer>,
        observers: Vec<Arc<dyn PlaybackObserver>>,
        timeout: Option<Duration>,
    ) -> Self {
        let surface = surface.into();
        let timeline = |timeline| {
            Arc::new(
                PlaybackScheduler::new(surface.clone(), Arc::clone(&catalogs))
                    .with_timeline(timeline)
                    .with_pacer(Arc::clone(&pacer))
                    .with_observers(&observers)
                    .with_timeout(timeout),
            )
        };
        let extractor = timeline(Timeline::Extractor);
        let analyzer = timeline(Timeline::Analyzer);

        Self {
            surface,
            catalogs,
            extractor,
            analyzer,
            observers: Arc::new(observers),
            state: Arc::new(Mutex::new(JoinState::default())),
        }
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    /// Start both timelines for `subject_id`. The returned handle resolves
    /// with the joined outcome.
    pub fn start(&self, subject_id: &str) -> Result<RunHandle, PlaybackError> {
        let dual = self.catalogs.get_dual(subject_id)?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?;

        let mut state = lock(&self.state);
        if state.status == PlaybackStatus::Running {
            return Err(PlaybackError::AlreadyRunning {
                surface: self.surface.clone(),
            });
        }

        let session_id = Uuid::new_v4();
        let ctx = EventContext {
            surface: self.surface.clone(),
            timeline: Timeline::Joined,
            session_id,
            catalog_id: subject_id.to_string(),
        };
        let extractor = self.extractor.start_catalog(Arc::clone(&dual.extractor))?;
        let analyzer = match self.analyzer.start_catalog(Arc::clone(&dual.analyzer)) {
            Ok(handle) => handle,
            Err(e) => {
                self.extractor.cancel_with(CancelReason::Aborted);
                return Err(e);
            }
        };

        *state = JoinState {
            session_id: Some(session_id),
            subject_id: subject_id.to_string(),
            status: PlaybackStatus::Running,
            final_result: None,
            cancel_reason: None,
        };
        for observer in self.observers.iter() {
            observer.on_start(&ctx, dual.extractor.len() + dual.analyzer.len());
        }
        drop(state);

        debug!(
            surface = %self.surface,
            subject = %subject_id,
            extractor_steps = dual.extractor.len(),
            analyzer_steps = dual.analyzer.len(),
            "Dual playback started"
        );

        let (tx, rx) = oneshot::channel();
        let join = JoinTask {
            ctx,
            extractor: Arc::clone(&self.extractor),
            analyzer: Arc::clone(&self.analyzer),
            observers: Arc::clone(&self.observers),
            state: Arc::clone(&self.state),
        };
        runtime.spawn(async move {
            let outcome = join.run(extractor, analyzer).await;
            let _ = tx.send(outcome);
        });

        Ok(RunHandle::new(session_id, rx))
    }

    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::Requested)
    }

    pub fn teardown(&self) -> bool {
        self.cancel_with(CancelReason::Teardown)
    }

    /// Cancel both timelines. The joined cancellation is reported by the
    /// join task once both have stopped.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        {
            let mut state = lock(&self.state);
            if state.status != PlaybackStatus::Running {
                return false;
            }
            state.status = PlaybackStatus::Cancelled;
            state.cancel_reason = Some(reason);
        }
        self.extractor.cancel_with(reason);
        self.analyzer.cancel_with(reason);
        true
    }

    pub fn status(&self) -> PlaybackStatus {
        lock(&self.state).status
    }

    pub fn is_running(&self) -> bool {
        self.status() == PlaybackStatus::Running
    }

    /// Combined progress over both timelines' steps.
    pub fn progress_percent(&self) -> f64 {
        let ext = self.extractor.snapshot();
        let ana = self.analyzer.snapshot();
        dual_progress(ext.as_ref(), ana.as_ref())
    }

    pub fn snapshot(&self) -> Option<DualSnapshot> {
        let state = lock(&self.state);
        let session_id = state.session_id?;
        let extractor = self.extractor.snapshot();
        let analyzer = self.analyzer.snapshot();

        let combined_result = state.final_result.clone().unwrap_or_else(|| {
            aggregator::combine(
                &extractor
                    .as_ref()
                    .map(|s| s.accumulated_result.clone())
                    .unwrap_or_default(),
                &analyzer
                    .as_ref()
                    .map(|s| s.accumulated_result.clone())
                    .unwrap_or_default(),
            )
        });

        Some(DualSnapshot {
            session_id,
            surface: self.surface.clone(),
            subject_id: state.subject_id.clone(),
            status: state.status,
            progress_percent: dual_progress(extractor.as_ref(), analyzer.as_ref()),
            extractor,
            analyzer,
            combined_result,
            cancel_reason: state.cancel_reason,
        })
    }
}

impl Drop for DualPlayback {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn dual_progress(ext: Option<&SessionSnapshot>, ana: Option<&SessionSnapshot>) -> f64 {
    let (done, total) = [ext, ana]
        .into_iter()
        .flatten()
        .fold((0, 0), |(done, total), s| {
            (done + s.completed_steps, total + s.total_steps)
        });
    progress(done, total)
}

// ============================================================================
// Join Task
// ============================================================================

struct JoinTask {
    ctx: EventContext,
    extractor: Arc<PlaybackScheduler>,
    analyzer: Arc<PlaybackScheduler>,
    observers: Arc<Vec<Arc<dyn PlaybackObserver>>>,
    state: Arc<Mutex<JoinState>>,
}

impl JoinTask {
    async fn run(self, extractor: RunHandle, analyzer: RunHandle) -> PlaybackOutcome {
        let ext = extractor.finished();
        let ana = analyzer.finished();
        tokio::pin!(ext, ana);

        // Whichever timeline settles first decides whether the peer is
        // allowed to keep running.
        let (ext_outcome, ana_outcome) = tokio::select! {
            outcome = &mut ext => {
                if let PlaybackOutcome::Cancelled(_) = outcome {
                    self.analyzer.cancel_with(CancelReason::PeerCancelled);
                }
                (outcome, ana.await)
            }
            outcome = &mut ana => {
                if let PlaybackOutcome::Cancelled(_) = outcome {
                    self.extractor.cancel_with(CancelReason::PeerCancelled);
                }
                (ext.await, outcome)
            }
        };

        let mut state = lock(&self.state);
        if !state.is_current(self.ctx.session_id) {
            // Superseded by a newer run; only this run's observers care.
            let outcome = first_cancel(&ext_outcome, &ana_outcome);
            if let PlaybackOutcome::Cancelled(reason) = outcome {
                for observer in self.observers.iter() {
                    observer.on_cancelled(&self.ctx, reason);
                }
            }
            return outcome;
        }

        match (&ext_outcome, &ana_outcome) {
            (PlaybackOutcome::Completed(ext), PlaybackOutcome::Completed(ana))
                if state.status == PlaybackStatus::Running =>
            {
                let combined = aggregator::combine(ext, ana);
                state.status = PlaybackStatus::Complete;
                state.final_result = Some(combined.clone());
                for observer in self.observers.iter() {
                    observer.on_complete(&self.ctx, &combined);
                }
                drop(state);
                debug!(
                    surface = %self.ctx.surface,
                    subject = %self.ctx.catalog_id,
                    findings = combined.findings.len(),
                    risks = combined.risks.len(),
                    "Dual playback complete"
                );
                PlaybackOutcome::Completed(combined)
            }
            _ => {
                let reason = state.cancel_reason.unwrap_or_else(|| {
                    match first_cancel(&ext_outcome, &ana_outcome) {
                        PlaybackOutcome::Cancelled(reason) => reason,
                        PlaybackOutcome::Completed(_) => CancelReason::Aborted,
                    }
                });
                state.status = PlaybackStatus::Cancelled;
                state.cancel_reason = Some(reason);
                for observer in self.observers.iter() {
                    observer.on_cancelled(&self.ctx, reason);
                }
                drop(state);
                debug!(
                    surface = %self.ctx.surface,
                    subject = %self.ctx.catalog_id,
                    %reason,
                    "Dual playback cancelled"
                );
                PlaybackOutcome::Cancelled(reason)
            }
        }
    }
}

/// The originating cancellation, preferring a non-peer reason.
fn first_cancel(ext: &PlaybackOutcome, ana: &PlaybackOutcome) -> PlaybackOutcome {
    let reasons = [ext, ana].into_iter().filter_map(|o| match o {
        PlaybackOutcome::Cancelled(reason) => Some(*reason),
        PlaybackOutcome::Completed(_) => None,
    });
    let mut fallback = None;
    for reason in reasons {
        if reason != CancelReason::PeerCancelled {
            return PlaybackOutcome::Cancelled(reason);
        }
        fallback = Some(reason);
    }
    PlaybackOutcome::Cancelled(fallback.unwrap_or(CancelReason::Aborted))
}
