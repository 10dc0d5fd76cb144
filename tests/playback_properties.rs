//! Playback Property Tests
//!
//! End-to-end behaviour of the scheduler and the two-timeline join under a
//! paused Tokio clock, so every simulated duration is exact.

use briefcast::catalog::CatalogRegistry;
use briefcast::playback::{
    DualPlayback, EventContext, PlaybackError, PlaybackObserver, PlaybackScheduler,
    RealtimePacer,
};
use briefcast::types::{
    AnalysisResult, CancelReason, PlaybackOutcome, PlaybackStatus, Step, Timeline,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    StepStart { timeline: Timeline, step: String, index: usize, total: usize },
    StepComplete { timeline: Timeline, step: String, findings: usize },
    Complete { timeline: Timeline, findings: Vec<String> },
    Cancelled { timeline: Timeline, reason: CancelReason },
}

/// Records every notification with the paused-clock time it arrived at.
struct TimedRecorder {
    t0: Instant,
    seen: Mutex<Vec<(u128, Seen)>>,
}

impl TimedRecorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            t0: Instant::now(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn push(&self, seen: Seen) {
        let at = self.t0.elapsed().as_millis();
        self.seen.lock().unwrap().push((at, seen));
    }

    fn seen(&self) -> Vec<(u128, Seen)> {
        self.seen.lock().unwrap().clone()
    }

    fn completions(&self) -> Vec<(u128, String)> {
        self.seen()
            .into_iter()
            .filter_map(|(at, s)| match s {
                Seen::StepComplete { step, .. } => Some((at, step)),
                _ => None,
            })
            .collect()
    }
}

impl PlaybackObserver for TimedRecorder {
    fn on_step_start(&self, ctx: &EventContext, step: &Step, index: usize, total: usize) {
        self.push(Seen::StepStart {
            timeline: ctx.timeline,
            step: step.id.clone(),
            index,
            total,
        });
    }

    fn on_step_complete(
        &self,
        ctx: &EventContext,
        step: &Step,
        _index: usize,
        _total: usize,
        partial: &AnalysisResult,
    ) {
        self.push(Seen::StepComplete {
            timeline: ctx.timeline,
            step: step.id.clone(),
            findings: partial.findings.len(),
        });
    }

    fn on_complete(&self, ctx: &EventContext, result: &AnalysisResult) {
        self.push(Seen::Complete {
            timeline: ctx.timeline,
            findings: result.findings.clone(),
        });
    }

    fn on_cancelled(&self, ctx: &EventContext, reason: CancelReason) {
        self.push(Seen::Cancelled {
            timeline: ctx.timeline,
            reason,
        });
    }
}

fn catalogs() -> Arc<CatalogRegistry> {
    Arc::new(CatalogRegistry::builtin().unwrap())
}

fn scheduler(recorder: &Arc<TimedRecorder>) -> PlaybackScheduler {
    PlaybackScheduler::new("viewer", catalogs())
        .with_pacer(Arc::new(RealtimePacer::default()))
        .with_observer(recorder.clone())
}

// ============================================================================
// Literal Scenario
// ============================================================================

#[tokio::test(start_paused = true)]
async fn nda_demo_plays_on_its_literal_timeline() {
    let recorder = TimedRecorder::new();
    let scheduler = scheduler(&recorder);

    let handle = scheduler.start("nda-demo").unwrap();
    let at_start = scheduler.snapshot().unwrap();
    assert_eq!(at_start.status, PlaybackStatus::Running);
    assert_eq!(at_start.current_step_index, 0);
    assert_eq!(at_start.progress_percent, 0.0);

    let outcome = handle.finished().await;

    let seen = recorder.seen();
    let step_completes: Vec<(u128, String, usize)> = seen
        .iter()
        .filter_map(|(at, s)| match s {
            Seen::StepComplete { step, findings, .. } => Some((*at, step.clone(), *findings)),
            _ => None,
        })
        .collect();
    assert_eq!(
        step_completes,
        vec![
            (500, "intake".to_string(), 1),
            (1500, "extract".to_string(), 2),
            (2300, "risk".to_string(), 3),
        ]
    );

    let expected_findings = vec![
        "doc received".to_string(),
        "47 terms extracted".to_string(),
        "medium risk: broad confidentiality scope".to_string(),
    ];
    assert_eq!(
        seen.last(),
        Some(&(
            2300,
            Seen::Complete {
                timeline: Timeline::Main,
                findings: expected_findings.clone()
            }
        ))
    );

    let PlaybackOutcome::Completed(result) = outcome else {
        panic!("nda-demo should complete");
    };
    assert_eq!(result.findings, expected_findings);
    assert_eq!(result.merged_steps, vec!["intake", "extract", "risk"]);

    let done = scheduler.snapshot().unwrap();
    assert_eq!(done.status, PlaybackStatus::Complete);
    assert_eq!(done.progress_percent, 100.0);
    assert_eq!(done.elapsed_ms, 2300);
}

#[tokio::test(start_paused = true)]
async fn step_start_precedes_its_completion() {
    let recorder = TimedRecorder::new();
    let scheduler = scheduler(&recorder);
    scheduler.start("nda-demo").unwrap().finished().await;

    let starts: Vec<(u128, String, usize, usize)> = recorder
        .seen()
        .into_iter()
        .filter_map(|(at, s)| match s {
            Seen::StepStart { step, index, total, .. } => Some((at, step, index, total)),
            _ => None,
        })
        .collect();
    assert_eq!(
        starts,
        vec![
            (0, "intake".to_string(), 0, 3),
            (500, "extract".to_string(), 1, 3),
            (1500, "risk".to_string(), 2, 3),
        ]
    );
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test(start_paused = true)]
async fn progress_is_monotonic_while_running() {
    let scheduler = PlaybackScheduler::new("viewer", catalogs());
    let handle = scheduler.start("deposition").unwrap();

    let mut last = 0.0;
    let mut samples = 0;
    while scheduler.is_running() {
        let now = scheduler.progress_percent();
        assert!(now >= last, "progress went backwards: {last} -> {now}");
        assert!((0.0..=100.0).contains(&now));
        last = now;
        samples += 1;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(samples > 10);
    assert!(handle.finished().await.is_completed());
    assert_eq!(scheduler.progress_percent(), 100.0);
}

#[tokio::test(start_paused = true)]
async fn completion_is_deterministic_under_paused_time() {
    let mut runs = Vec::new();
    for _ in 0..3 {
        let recorder = TimedRecorder::new();
        let scheduler = scheduler(&recorder);
        let outcome = scheduler.start("service-contract").unwrap().finished().await;
        runs.push((recorder.completions(), outcome));
    }
    assert!(runs.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test(start_paused = true)]
async fn step_completions_follow_catalog_order() {
    let registry = catalogs();
    let recorder = TimedRecorder::new();
    let scheduler = PlaybackScheduler::new("viewer", Arc::clone(&registry))
        .with_observer(recorder.clone());
    scheduler.start("discovery-request").unwrap().finished().await;

    let expected: Vec<String> = registry
        .get_catalog("discovery-request")
        .unwrap()
        .steps()
        .iter()
        .map(|s| s.id.clone())
        .collect();
    let completed: Vec<String> = recorder.completions().into_iter().map(|(_, id)| id).collect();
    assert_eq!(completed, expected);
}

#[tokio::test(start_paused = true)]
async fn restart_after_complete_starts_fresh() {
    let scheduler = PlaybackScheduler::new("viewer", catalogs());
    let first = scheduler.start("nda-demo").unwrap();
    let first_id = first.session_id();
    first.finished().await;

    let second = scheduler.start("nda-demo").unwrap();
    assert_ne!(second.session_id(), first_id);
    let snapshot = scheduler.snapshot().unwrap();
    assert_eq!(snapshot.status, PlaybackStatus::Running);
    assert!(snapshot.accumulated_result.is_empty());

    let PlaybackOutcome::Completed(result) = second.finished().await else {
        panic!("restart should complete");
    };
    assert_eq!(result.findings.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn restart_after_cancel_starts_fresh() {
    let recorder = TimedRecorder::new();
    let scheduler = scheduler(&recorder);
    let first = scheduler.start("nda-demo").unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(scheduler.cancel());
    assert_eq!(
        first.finished().await,
        PlaybackOutcome::Cancelled(CancelReason::Requested)
    );
    assert_eq!(scheduler.status(), PlaybackStatus::Cancelled);

    let second = scheduler.start("nda-demo").unwrap();
    assert!(second.finished().await.is_completed());
    assert_eq!(scheduler.accumulated_result().findings.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn busy_surface_rejects_second_start() {
    let scheduler = PlaybackScheduler::new("viewer", catalogs());
    let running = scheduler.start("nda-demo").unwrap();

    let err = scheduler.start("nda").unwrap_err();
    assert!(matches!(err, PlaybackError::AlreadyRunning { ref surface } if surface == "viewer"));
    assert_eq!(err.code(), "ALREADY_RUNNING");

    // The original run is untouched.
    assert!(running.finished().await.is_completed());
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_every_later_transition() {
    let recorder = TimedRecorder::new();
    let scheduler = scheduler(&recorder);
    let handle = scheduler.start("nda-demo").unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(scheduler.cancel());
    assert!(!scheduler.cancel());
    handle.finished().await;
    let frozen = recorder.seen();

    // Nothing else fires even after every step would have finished.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(recorder.seen(), frozen);

    let completions: Vec<String> = recorder.completions().into_iter().map(|(_, id)| id).collect();
    assert_eq!(completions, vec!["intake"]);
    assert_eq!(
        frozen.last().map(|(at, s)| (*at, s.clone())),
        Some((
            600,
            Seen::Cancelled {
                timeline: Timeline::Main,
                reason: CancelReason::Requested
            }
        ))
    );

    let snapshot = scheduler.snapshot().unwrap();
    assert_eq!(snapshot.completed_steps, 1);
    assert_eq!(snapshot.cancel_reason, Some(CancelReason::Requested));
}

#[tokio::test(start_paused = true)]
async fn unknown_subject_fails_closed() {
    let recorder = TimedRecorder::new();
    let scheduler = scheduler(&recorder);
    let err = scheduler.start("lease-agreement").unwrap_err();
    assert!(err.is_unknown_subject());
    assert_eq!(err.code(), "UNKNOWN_SUBJECT");
    assert!(scheduler.snapshot().is_none());
    assert!(recorder.seen().is_empty());
}

// ============================================================================
// Two-Timeline Join
// ============================================================================

fn dual(recorder: &Arc<TimedRecorder>) -> DualPlayback {
    let observer: Arc<dyn PlaybackObserver> = recorder.clone();
    DualPlayback::new(
        "viewer",
        catalogs(),
        Arc::new(RealtimePacer::default()),
        vec![observer],
        None,
    )
}

#[tokio::test(start_paused = true)]
async fn join_completes_only_after_both_timelines() {
    let recorder = TimedRecorder::new();
    let playback = dual(&recorder);
    let handle = playback.start("nda").unwrap();
    let outcome = handle.finished().await;

    let seen = recorder.seen();
    let completes: Vec<(u128, Timeline)> = seen
        .iter()
        .filter_map(|(at, s)| match s {
            Seen::Complete { timeline, .. } => Some((*at, *timeline)),
            _ => None,
        })
        .collect();
    // Extractor: 700 + 900 + 1100. Analyzer: 800 + 1300 + 900 + 600.
    assert_eq!(
        completes,
        vec![
            (2700, Timeline::Extractor),
            (3600, Timeline::Analyzer),
            (3600, Timeline::Joined),
        ]
    );

    let PlaybackOutcome::Completed(result) = outcome else {
        panic!("dual nda should complete");
    };
    assert_eq!(result.findings.first().map(String::as_str), Some("4 pages scanned"));
    assert_eq!(
        result.findings.last().map(String::as_str),
        Some("47 terms extracted")
    );
    assert_eq!(result.findings.len(), 6);
    assert_eq!(
        result.summary.as_deref(),
        Some("Both models agree: sign after narrowing §2.1 and §7.3")
    );
    assert_eq!(playback.status(), PlaybackStatus::Complete);
    assert_eq!(playback.progress_percent(), 100.0);
}

#[tokio::test(start_paused = true)]
async fn join_cancel_reaches_both_timelines() {
    let recorder = TimedRecorder::new();
    let playback = dual(&recorder);
    let handle = playback.start("nda").unwrap();

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(playback.cancel());
    assert_eq!(
        handle.finished().await,
        PlaybackOutcome::Cancelled(CancelReason::Requested)
    );

    let cancelled: Vec<Timeline> = recorder
        .seen()
        .into_iter()
        .filter_map(|(_, s)| match s {
            Seen::Cancelled { timeline, .. } => Some(timeline),
            _ => None,
        })
        .collect();
    assert!(cancelled.contains(&Timeline::Extractor));
    assert!(cancelled.contains(&Timeline::Analyzer));
    assert!(cancelled.contains(&Timeline::Joined));
    assert!(!recorder
        .seen()
        .iter()
        .any(|(_, s)| matches!(s, Seen::Complete { .. })));
    assert_eq!(playback.status(), PlaybackStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn join_unknown_subject_starts_nothing() {
    let recorder = TimedRecorder::new();
    let playback = dual(&recorder);
    let err = playback.start("nda-demo").unwrap_err();
    assert!(err.is_unknown_subject());
    assert!(!playback.is_running());
    assert!(recorder.seen().is_empty());
}
