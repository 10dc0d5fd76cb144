//! Staged Playback Engine
//!
//! Plays a [`Catalog`](crate::catalog::Catalog) one step at a time, waiting
//! each step's simulated duration, folding its payload into the session
//! result and notifying observers.
//!
//! ## Components
//!
//! - [`PlaybackSession`]: single-owner session state (status, index, result)
//! - [`PlaybackScheduler`]: spawns the driver task and guards the session
//! - [`DualPlayback`]: two schedulers behind a two-way join
//! - [`SurfaceRegistry`]: one playback per host view, with teardown
//! - [`Pacer`]: the only suspension point, swappable for tests and `--speed`
//! - [`PlaybackObserver`] / [`EventBus`]: push notifications

pub mod join;
pub mod observer;
pub mod pacer;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use join::{DualPlayback, DualSnapshot};
pub use observer::{EventBus, EventContext, EventKind, LoggingObserver, PlaybackEvent, PlaybackObserver};
pub use pacer::{ImmediatePacer, Pacer, RealtimePacer};
pub use registry::{PlaybackMode, SurfaceRegistry, SurfaceSnapshot};
pub use scheduler::{PlaybackScheduler, RunHandle};
pub use session::PlaybackSession;

use thiserror::Error;

use crate::catalog::CatalogError;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Surface {surface} already has a running session")]
    AlreadyRunning { surface: String },

    #[error("Unknown surface: {0}")]
    UnknownSurface(String),

    #[error("Playback must be started from within a Tokio runtime")]
    NoRuntime,
}

impl PlaybackError {
    pub fn is_unknown_subject(&self) -> bool {
        matches!(self, PlaybackError::Catalog(CatalogError::UnknownSubject(_)))
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            PlaybackError::Catalog(CatalogError::UnknownSubject(_)) => "UNKNOWN_SUBJECT",
            PlaybackError::Catalog(_) => "INVALID_CATALOG",
            PlaybackError::AlreadyRunning { .. } => "ALREADY_RUNNING",
            PlaybackError::UnknownSurface(_) => "UNKNOWN_SURFACE",
            PlaybackError::NoRuntime => "INTERNAL_ERROR",
        }
    }
}
