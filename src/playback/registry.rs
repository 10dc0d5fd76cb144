//! Surface registry - one playback per host view
//!
//! A surface is whatever the host renders a playback into (a browser tab, a
//! terminal). Each surface owns exactly one playback, single-timeline or
//! dual, and [`SurfaceRegistry::teardown`] is the unmount hook: it cancels
//! the run in flight and forgets the surface.
//!
//! Finished surfaces keep their last snapshot for reads, up to a limit. Past
//! it, the finished surface started least recently is evicted on the next
//! start.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::join::{DualPlayback, DualSnapshot};
use super::observer::PlaybackObserver;
use super::pacer::Pacer;
use super::scheduler::{PlaybackScheduler, RunHandle};
use super::PlaybackError;
use crate::catalog::CatalogRegistry;
use crate::config::defaults;
use crate::types::{AnalysisResult, PlaybackStatus, SessionSnapshot};

/// Which kind of playback a surface runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Six-stage document processor
    #[default]
    Single,
    /// GPT-4 Vision and Claude timelines joined
    Dual,
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Single => write!(f, "single"),
            PlaybackMode::Dual => write!(f, "dual"),
        }
    }
}

/// Read-only view of whatever a surface is playing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SurfaceSnapshot {
    Single(SessionSnapshot),
    Dual(DualSnapshot),
}

impl SurfaceSnapshot {
    pub fn status(&self) -> PlaybackStatus {
        match self {
            SurfaceSnapshot::Single(s) => s.status,
            SurfaceSnapshot::Dual(d) => d.status,
        }
    }

    pub fn progress_percent(&self) -> f64 {
        match self {
            SurfaceSnapshot::Single(s) => s.progress_percent,
            SurfaceSnapshot::Dual(d) => d.progress_percent,
        }
    }

    /// Result accumulated so far (combined for dual playback).
    pub fn result(&self) -> &AnalysisResult {
        match self {
            SurfaceSnapshot::Single(s) => &s.accumulated_result,
            SurfaceSnapshot::Dual(d) => &d.combined_result,
        }
    }
}

#[derive(Debug)]
enum SurfacePlayback {
    Single(PlaybackScheduler),
    Dual(DualPlayback),
}

impl SurfacePlayback {
    fn mode(&self) -> PlaybackMode {
        match self {
            SurfacePlayback::Single(_) => PlaybackMode::Single,
            SurfacePlayback::Dual(_) => PlaybackMode::Dual,
        }
    }

    fn status(&self) -> PlaybackStatus {
        match self {
            SurfacePlayback::Single(s) => s.status(),
            SurfacePlayback::Dual(d) => d.status(),
        }
    }

    fn is_running(&self) -> bool {
        self.status() == PlaybackStatus::Running
    }

    /// Nothing left to drive: finished, or never got going.
    fn is_settled(&self) -> bool {
        let status = self.status();
        status.is_terminal() || status == PlaybackStatus::Idle
    }

    fn start(&self, subject_id: &str) -> Result<RunHandle, PlaybackError> {
        match self {
            SurfacePlayback::Single(s) => s.start(subject_id),
            SurfacePlayback::Dual(d) => d.start(subject_id),
        }
    }

    fn cancel(&self) -> bool {
        match self {
            SurfacePlayback::Single(s) => s.cancel(),
            SurfacePlayback::Dual(d) => d.cancel(),
        }
    }

    fn teardown(&self) -> bool {
        match self {
            SurfacePlayback::Single(s) => s.teardown(),
            SurfacePlayback::Dual(d) => d.teardown(),
        }
    }

    fn snapshot(&self) -> Option<SurfaceSnapshot> {
        match self {
            SurfacePlayback::Single(s) => s.snapshot().map(SurfaceSnapshot::Single),
            SurfacePlayback::Dual(d) => d.snapshot().map(SurfaceSnapshot::Dual),
        }
    }
}

#[derive(Debug)]
struct SurfaceEntry {
    playback: SurfacePlayback,
    /// Start sequence number of the latest run, for eviction order
    last_started: u64,
}

#[derive(Debug, Default)]
struct SurfaceTable {
    entries: BTreeMap<String, SurfaceEntry>,
    starts: u64,
}

/// Named surfaces and the playback each one owns.
pub struct SurfaceRegistry {
    catalogs: Arc<CatalogRegistry>,
    pacer: Arc<dyn Pacer>,
    observers: Vec<Arc<dyn PlaybackObserver>>,
    timeout: Option<Duration>,
    finished_limit: usize,
    surfaces: Mutex<SurfaceTable>,
}

impl std::fmt::Debug for SurfaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRegistry")
            .field("surfaces", &self.surface_names())
            .field("timeout", &self.timeout)
            .field("finished_limit", &self.finished_limit)
            .finish_non_exhaustive()
    }
}

impl SurfaceRegistry {
    pub fn new(
        catalogs: Arc<CatalogRegistry>,
        pacer: Arc<dyn Pacer>,
        observers: Vec<Arc<dyn PlaybackObserver>>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            catalogs,
            pacer,
            observers,
            timeout,
            finished_limit: defaults::FINISHED_SURFACE_LIMIT,
            surfaces: Mutex::new(SurfaceTable::default()),
        }
    }

    /// How many finished surfaces keep their snapshot (minimum 1).
    pub fn with_finished_limit(mut self, limit: usize) -> Self {
        self.finished_limit = limit.max(1);
        self
    }

    pub fn catalogs(&self) -> &Arc<CatalogRegistry> {
        &self.catalogs
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceTable> {
        self.surfaces.lock().unwrap_or_else(|poisoned| {
            warn!("Surface registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn build(&self, surface: &str, mode: PlaybackMode) -> SurfacePlayback {
        match mode {
            PlaybackMode::Single => SurfacePlayback::Single(
                PlaybackScheduler::new(surface, Arc::clone(&self.catalogs))
                    .with_pacer(Arc::clone(&self.pacer))
                    .with_observers(&self.observers)
                    .with_timeout(self.timeout),
            ),
            PlaybackMode::Dual => SurfacePlayback::Dual(DualPlayback::new(
                surface,
                Arc::clone(&self.catalogs),
                Arc::clone(&self.pacer),
                self.observers.clone(),
                self.timeout,
            )),
        }
    }

    /// Start `subject_id` on `surface`, creating the surface on first use.
    ///
    /// A surface that is running rejects the start with `AlreadyRunning`
    /// whatever mode is requested. A finished surface switches mode freely.
    pub fn start(
        &self,
        surface: &str,
        subject_id: &str,
        mode: PlaybackMode,
    ) -> Result<RunHandle, PlaybackError> {
        let mut table = self.lock();
        if let Some(existing) = table.entries.get(surface) {
            if existing.playback.is_running() {
                return Err(PlaybackError::AlreadyRunning {
                    surface: surface.to_string(),
                });
            }
        }

        // Validate before replacing so an unknown subject leaves the old
        // snapshot in place.
        match mode {
            PlaybackMode::Single => {
                self.catalogs.get_catalog(subject_id)?;
            }
            PlaybackMode::Dual => {
                self.catalogs.get_dual(subject_id)?;
            }
        }

        let current_mode = table.entries.get(surface).map(|e| e.playback.mode());
        if current_mode != Some(mode) {
            table.entries.insert(
                surface.to_string(),
                SurfaceEntry {
                    playback: self.build(surface, mode),
                    last_started: 0,
                },
            );
        }
        table.starts += 1;
        let seq = table.starts;
        let entry = table
            .entries
            .get_mut(surface)
            .ok_or_else(|| PlaybackError::UnknownSurface(surface.to_string()))?;
        let handle = entry.playback.start(subject_id)?;
        entry.last_started = seq;

        self.evict_finished(&mut table);
        drop(table);

        info!(surface, subject = subject_id, %mode, session = %handle.session_id(), "Surface playback started");
        Ok(handle)
    }

    /// Drop the least recently started finished surfaces beyond the limit.
    fn evict_finished(&self, table: &mut SurfaceTable) {
        let mut settled: Vec<(u64, String)> = table
            .entries
            .iter()
            .filter(|(_, entry)| entry.playback.is_settled())
            .map(|(name, entry)| (entry.last_started, name.clone()))
            .collect();
        if settled.len() <= self.finished_limit {
            return;
        }
        settled.sort_unstable();
        let excess = settled.len() - self.finished_limit;
        for (_, name) in settled.into_iter().take(excess) {
            table.entries.remove(&name);
            debug!(surface = %name, "Evicted finished surface");
        }
    }

    pub fn cancel(&self, surface: &str) -> Result<bool, PlaybackError> {
        self.lock()
            .entries
            .get(surface)
            .map(|e| e.playback.cancel())
            .ok_or_else(|| PlaybackError::UnknownSurface(surface.to_string()))
    }

    pub fn snapshot(&self, surface: &str) -> Result<SurfaceSnapshot, PlaybackError> {
        self.lock()
            .entries
            .get(surface)
            .and_then(|e| e.playback.snapshot())
            .ok_or_else(|| PlaybackError::UnknownSurface(surface.to_string()))
    }

    /// Cancel whatever the surface is playing and forget it. Returns whether
    /// a run was interrupted.
    pub fn teardown(&self, surface: &str) -> Result<bool, PlaybackError> {
        let entry = self
            .lock()
            .entries
            .remove(surface)
            .ok_or_else(|| PlaybackError::UnknownSurface(surface.to_string()))?;
        let interrupted = entry.playback.teardown();
        info!(surface, interrupted, "Surface torn down");
        Ok(interrupted)
    }

    /// Tear down every surface.
    pub fn shutdown(&self) -> usize {
        let surfaces = std::mem::take(&mut self.lock().entries);
        let count = surfaces.len();
        for (name, entry) in surfaces {
            if entry.playback.teardown() {
                info!(surface = %name, "Interrupted playback on shutdown");
            }
        }
        count
    }

    pub fn surface_names(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn running_count(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|e| e.playback.is_running())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::pacer::RealtimePacer;
    use crate::types::{CancelReason, PlaybackOutcome};

    fn registry() -> SurfaceRegistry {
        SurfaceRegistry::new(
            Arc::new(CatalogRegistry::builtin().unwrap()),
            Arc::new(RealtimePacer::default()),
            Vec::new(),
            None,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_are_independent() {
        let surfaces = registry();
        let _a = surfaces.start("left", "nda", PlaybackMode::Single).unwrap();
        let _b = surfaces.start("right", "nda", PlaybackMode::Dual).unwrap();
        assert_eq!(surfaces.running_count(), 2);
        assert_eq!(surfaces.surface_names(), vec!["left", "right"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_surface_rejects_any_mode() {
        let surfaces = registry();
        let _run = surfaces.start("viewer", "nda", PlaybackMode::Single).unwrap();
        for mode in [PlaybackMode::Single, PlaybackMode::Dual] {
            let err = surfaces.start("viewer", "deposition", mode).unwrap_err();
            assert!(matches!(err, PlaybackError::AlreadyRunning { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_subject_keeps_previous_snapshot() {
        let surfaces = registry();
        surfaces
            .start("viewer", "nda-demo", PlaybackMode::Single)
            .unwrap()
            .finished()
            .await;
        let err = surfaces
            .start("viewer", "lease", PlaybackMode::Dual)
            .unwrap_err();
        assert!(err.is_unknown_subject());
        let snapshot = surfaces.snapshot("viewer").unwrap();
        assert_eq!(snapshot.status(), PlaybackStatus::Complete);
        assert_eq!(snapshot.result().findings.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_and_forgets() {
        let surfaces = registry();
        let handle = surfaces.start("viewer", "nda", PlaybackMode::Dual).unwrap();
        assert!(surfaces.teardown("viewer").unwrap());
        assert_eq!(
            handle.finished().await,
            PlaybackOutcome::Cancelled(CancelReason::Teardown)
        );
        assert!(matches!(
            surfaces.snapshot("viewer"),
            Err(PlaybackError::UnknownSurface(_))
        ));
        assert!(surfaces.teardown("viewer").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_surfaces_are_evicted_past_limit() {
        let surfaces = registry().with_finished_limit(2);
        for name in ["a", "b", "c"] {
            surfaces
                .start(name, "nda-demo", PlaybackMode::Single)
                .unwrap()
                .finished()
                .await;
        }
        // "c" was still running when the limit was checked.
        assert_eq!(surfaces.surface_names(), vec!["a", "b", "c"]);

        // Restarting "a" makes "b" the oldest finished surface.
        surfaces
            .start("a", "nda-demo", PlaybackMode::Single)
            .unwrap()
            .finished()
            .await;
        let _running = surfaces.start("d", "nda", PlaybackMode::Single).unwrap();
        assert_eq!(surfaces.surface_names(), vec!["a", "c", "d"]);
        assert!(matches!(
            surfaces.snapshot("b"),
            Err(PlaybackError::UnknownSurface(_))
        ));
        assert_eq!(surfaces.running_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_surfaces_are_never_evicted() {
        let surfaces = registry().with_finished_limit(1);
        let _a = surfaces.start("a", "nda", PlaybackMode::Single).unwrap();
        let _b = surfaces.start("b", "nda", PlaybackMode::Dual).unwrap();
        let _c = surfaces.start("c", "deposition", PlaybackMode::Single).unwrap();
        assert_eq!(surfaces.running_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_tears_everything_down() {
        let surfaces = registry();
        let a = surfaces.start("a", "nda", PlaybackMode::Single).unwrap();
        let _b = surfaces.start("b", "deposition", PlaybackMode::Single).unwrap();
        assert_eq!(surfaces.shutdown(), 2);
        assert_eq!(
            a.finished().await,
            PlaybackOutcome::Cancelled(CancelReason::Teardown)
        );
        assert_eq!(surfaces.running_count(), 0);
    }
}
