//! Session-level status types and read-only snapshots

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AnalysisResult, StepStatus};

/// Lifecycle of a playback session.
///
/// `Idle -> Running -> Complete`, with `Running -> Cancelled` the only early
/// exit. There is no error state: nothing in a scripted run can fail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Cancelled,
}

impl PlaybackStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackStatus::Complete | PlaybackStatus::Cancelled)
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "IDLE"),
            PlaybackStatus::Running => write!(f, "RUNNING"),
            PlaybackStatus::Complete => write!(f, "COMPLETE"),
            PlaybackStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Which track of a playback an event belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    /// Single-track document processor
    Main,
    /// GPT-4 Vision track of a dual playback
    Extractor,
    /// Claude track of a dual playback
    Analyzer,
    /// The join of both dual tracks
    Joined,
}

impl std::fmt::Display for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeline::Main => write!(f, "main"),
            Timeline::Extractor => write!(f, "extractor"),
            Timeline::Analyzer => write!(f, "analyzer"),
            Timeline::Joined => write!(f, "joined"),
        }
    }
}

/// Why a session ended early.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Caller asked for it
    Requested,
    /// The overall session ceiling elapsed
    TimedOut,
    /// The owning surface was torn down
    Teardown,
    /// The other track of a dual playback was cancelled
    PeerCancelled,
    /// The driving task went away without reporting
    Aborted,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "requested"),
            CancelReason::TimedOut => write!(f, "timed out"),
            CancelReason::Teardown => write!(f, "surface torn down"),
            CancelReason::PeerCancelled => write!(f, "peer timeline cancelled"),
            CancelReason::Aborted => write!(f, "aborted"),
        }
    }
}

/// Read-only copy of a session, safe to hand to observers and the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub surface: String,
    pub timeline: Timeline,
    pub catalog_id: String,
    pub status: PlaybackStatus,
    /// -1 before the first step, `total_steps` once finished
    pub current_step_index: i64,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub step_statuses: Vec<StepStatus>,
    pub elapsed_ms: u64,
    pub expected_total_duration_ms: u64,
    pub progress_percent: f64,
    pub accumulated_result: AnalysisResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<CancelReason>,
}

/// Terminal result of one run, delivered to whoever awaits it.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Completed(AnalysisResult),
    Cancelled(CancelReason),
}

impl PlaybackOutcome {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            PlaybackOutcome::Completed(result) => Some(result),
            PlaybackOutcome::Cancelled(_) => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PlaybackOutcome::Completed(_))
    }
}
