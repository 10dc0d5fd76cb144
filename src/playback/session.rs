//! Single-owner playback session state
//!
//! A [`PlaybackSession`] is only ever touched by its scheduler. Every
//! mutator checks the current status first, so once a session is cancelled
//! or complete no call can move it again.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::aggregator;
use crate::catalog::Catalog;
use crate::types::{
    AnalysisResult, CancelReason, PlaybackStatus, SessionSnapshot, Step, StepStatus, Timeline,
};

#[derive(Debug)]
pub struct PlaybackSession {
    id: Uuid,
    surface: String,
    timeline: Timeline,
    catalog: Arc<Catalog>,
    status: PlaybackStatus,
    current_step_index: i64,
    step_statuses: Vec<StepStatus>,
    completed_steps: usize,
    accumulated: AnalysisResult,
    started_at: Option<Instant>,
    frozen_elapsed: Option<Duration>,
    cancel_reason: Option<CancelReason>,
}

impl PlaybackSession {
    pub fn new(surface: impl Into<String>, timeline: Timeline, catalog: Arc<Catalog>) -> Self {
        let steps = catalog.len();
        Self {
            id: Uuid::new_v4(),
            surface: surface.into(),
            timeline,
            catalog,
            status: PlaybackStatus::Idle,
            current_step_index: -1,
            step_statuses: vec![StepStatus::Pending; steps],
            completed_steps: 0,
            accumulated: AnalysisResult::default(),
            started_at: None,
            frozen_elapsed: None,
            cancel_reason: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn timeline(&self) -> Timeline {
        self.timeline
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == PlaybackStatus::Running
    }

    pub fn current_step_index(&self) -> i64 {
        self.current_step_index
    }

    pub fn accumulated_result(&self) -> &AnalysisResult {
        &self.accumulated
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.cancel_reason
    }

    /// `Idle -> Running`. Returns false if the session was already started.
    pub fn start(&mut self) -> bool {
        if self.status != PlaybackStatus::Idle {
            return false;
        }
        self.status = PlaybackStatus::Running;
        self.started_at = Some(Instant::now());
        true
    }

    /// Mark `index` as processing. Only the step right after the last
    /// completed one can begin.
    pub fn begin_step(&mut self, index: usize) -> Option<&Step> {
        if !self.is_running() || index != self.completed_steps {
            return None;
        }
        let step = self.catalog.step(index)?;
        if let Some(status) = self.step_statuses.get_mut(index) {
            *status = StepStatus::Processing;
        }
        self.current_step_index = index_i64(index);
        Some(step)
    }

    /// Mark `index` complete and fold its payload. Returns the partial
    /// result after the merge, or `None` if the session has left `Running`
    /// or `index` is not the step in flight.
    pub fn complete_step(&mut self, index: usize) -> Option<AnalysisResult> {
        if !self.is_running()
            || self.step_statuses.get(index) != Some(&StepStatus::Processing)
        {
            return None;
        }
        let step = self.catalog.step(index)?;
        let accumulated = std::mem::take(&mut self.accumulated);
        self.accumulated = aggregator::merge_step(accumulated, step);
        self.step_statuses[index] = StepStatus::Complete;
        self.completed_steps += 1;
        Some(self.accumulated.clone())
    }

    /// `Running -> Complete` once every step has completed. Returns the
    /// final result.
    pub fn finish(&mut self) -> Option<AnalysisResult> {
        if !self.is_running() || self.completed_steps != self.catalog.len() {
            return None;
        }
        self.status = PlaybackStatus::Complete;
        self.current_step_index = index_i64(self.catalog.len());
        self.frozen_elapsed = Some(self.elapsed());
        Some(self.accumulated.clone())
    }

    /// `Running -> Cancelled`. A step that was processing stays
    /// processing; its payload is never merged.
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = PlaybackStatus::Cancelled;
        self.cancel_reason = Some(reason);
        self.frozen_elapsed = Some(self.elapsed());
        true
    }

    pub fn elapsed(&self) -> Duration {
        match (self.frozen_elapsed, self.started_at) {
            (Some(frozen), _) => frozen,
            (None, Some(started)) => started.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    /// `completed / total * 100`, clamped. Never decreases within a run.
    pub fn progress_percent(&self) -> f64 {
        progress(self.completed_steps, self.catalog.len())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            surface: self.surface.clone(),
            timeline: self.timeline,
            catalog_id: self.catalog.id().to_string(),
            status: self.status,
            current_step_index: self.current_step_index,
            total_steps: self.catalog.len(),
            completed_steps: self.completed_steps,
            step_statuses: self.step_statuses.clone(),
            elapsed_ms: u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
            expected_total_duration_ms: self.catalog.expected_total_duration_ms(),
            progress_percent: self.progress_percent(),
            accumulated_result: self.accumulated.clone(),
            cancel_reason: self.cancel_reason,
        }
    }
}

/// Shared progress formula for single and dual playback.
pub fn progress(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let percent = completed as f64 / total as f64 * 100.0;
    percent.clamp(0.0, 100.0)
}

fn index_i64(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
