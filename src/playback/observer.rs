//! Playback notifications
//!
//! Observers are push-only and read-only: every callback receives borrowed
//! snapshots, never the live session. Callbacks run on the scheduler's task
//! and must not block.
//!
//! [`EventBus`] is the observer the HTTP host uses: it turns callbacks into
//! [`PlaybackEvent`]s on a broadcast channel that SSE clients subscribe to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{AgentTag, AnalysisResult, CancelReason, Step, Timeline};

/// Identifies which run a notification belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventContext {
    pub surface: String,
    pub timeline: Timeline,
    pub session_id: Uuid,
    pub catalog_id: String,
}

/// Receives playback transitions. Every method defaults to a no-op.
pub trait PlaybackObserver: Send + Sync {
    fn on_start(&self, _ctx: &EventContext, _total: usize) {}

    fn on_step_start(&self, _ctx: &EventContext, _step: &Step, _index: usize, _total: usize) {}

    fn on_step_complete(
        &self,
        _ctx: &EventContext,
        _step: &Step,
        _index: usize,
        _total: usize,
        _partial: &AnalysisResult,
    ) {
    }

    fn on_complete(&self, _ctx: &EventContext, _result: &AnalysisResult) {}

    fn on_cancelled(&self, _ctx: &EventContext, _reason: CancelReason) {}
}

/// Observer that logs transitions through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl PlaybackObserver for LoggingObserver {
    fn on_start(&self, ctx: &EventContext, total: usize) {
        info!(
            surface = %ctx.surface,
            timeline = %ctx.timeline,
            catalog = %ctx.catalog_id,
            steps = total,
            "▶️  Playback started"
        );
    }

    fn on_step_start(&self, ctx: &EventContext, step: &Step, index: usize, total: usize) {
        debug!(
            surface = %ctx.surface,
            timeline = %ctx.timeline,
            step = %step.id,
            "[{}/{}] {} ({})",
            index + 1,
            total,
            step.label,
            step.agent_tag.model_label()
        );
    }

    fn on_step_complete(
        &self,
        ctx: &EventContext,
        step: &Step,
        index: usize,
        total: usize,
        partial: &AnalysisResult,
    ) {
        debug!(
            surface = %ctx.surface,
            timeline = %ctx.timeline,
            step = %step.id,
            findings = partial.findings.len(),
            risks = partial.risks.len(),
            "[{}/{}] {} complete",
            index + 1,
            total,
            step.label
        );
    }

    fn on_complete(&self, ctx: &EventContext, result: &AnalysisResult) {
        info!(
            surface = %ctx.surface,
            timeline = %ctx.timeline,
            findings = result.findings.len(),
            risks = result.risks.len(),
            recommendations = result.recommendations.len(),
            "✅ Playback complete"
        );
    }

    fn on_cancelled(&self, ctx: &EventContext, reason: CancelReason) {
        info!(
            surface = %ctx.surface,
            timeline = %ctx.timeline,
            reason = %reason,
            "🛑 Playback cancelled"
        );
    }
}

// ============================================================================
// Events
// ============================================================================

/// Serialisable form of one observer callback.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackEvent {
    #[serde(flatten)]
    pub context: EventContext,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Started {
        total_steps: usize,
    },
    StepStarted {
        step_id: String,
        label: String,
        agent_tag: AgentTag,
        index: usize,
        total: usize,
    },
    StepCompleted {
        step_id: String,
        label: String,
        agent_tag: AgentTag,
        index: usize,
        total: usize,
        progress_percent: f64,
        partial_result: AnalysisResult,
    },
    Completed {
        result: AnalysisResult,
    },
    Cancelled {
        reason: CancelReason,
    },
}

impl EventKind {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Started { .. } => "started",
            EventKind::StepStarted { .. } => "step_started",
            EventKind::StepCompleted { .. } => "step_completed",
            EventKind::Completed { .. } => "completed",
            EventKind::Cancelled { .. } => "cancelled",
        }
    }
}

/// Progress after `index` (zero-based) of `total` steps completed.
pub fn step_progress(index: usize, total: usize) -> f64 {
    super::session::progress(index + 1, total)
}

/// Broadcast fan-out of playback events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&self, ctx: &EventContext, kind: EventKind) {
        // No subscribers is the normal state between SSE connections.
        let _ = self.tx.send(PlaybackEvent {
            context: ctx.clone(),
            emitted_at: Utc::now(),
            kind,
        });
    }
}

impl PlaybackObserver for EventBus {
    fn on_start(&self, ctx: &EventContext, total: usize) {
        self.publish(ctx, EventKind::Started { total_steps: total });
    }

    fn on_step_start(&self, ctx: &EventContext, step: &Step, index: usize, total: usize) {
        self.publish(
            ctx,
            EventKind::StepStarted {
                step_id: step.id.clone(),
                label: step.label.clone(),
                agent_tag: step.agent_tag,
                index,
                total,
            },
        );
    }

    fn on_step_complete(
        &self,
        ctx: &EventContext,
        step: &Step,
        index: usize,
        total: usize,
        partial: &AnalysisResult,
    ) {
        self.publish(
            ctx,
            EventKind::StepCompleted {
                step_id: step.id.clone(),
                label: step.label.clone(),
                agent_tag: step.agent_tag,
                index,
                total,
                progress_percent: step_progress(index, total),
                partial_result: partial.clone(),
            },
        );
    }

    fn on_complete(&self, ctx: &EventContext, result: &AnalysisResult) {
        self.publish(
            ctx,
            EventKind::Completed {
                result: result.clone(),
            },
        );
    }

    fn on_cancelled(&self, ctx: &EventContext, reason: CancelReason) {
        self.publish(ctx, EventKind::Cancelled { reason });
    }
}
