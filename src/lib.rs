//! Briefcast: Staged Playback Engine
//!
//! Replays scripted document-analysis pipelines step by step so a demo can
//! look like live AI review of a legal document.
//!
//! ## Architecture
//!
//! - **Catalog**: ordered, validated step scripts per subject, plus the
//!   sample document library
//! - **Playback**: scheduler, two-timeline join, surfaces, observers
//! - **Aggregator**: folds step payloads into one analysis result
//! - **API**: HTTP + SSE host for a browser front end

pub mod aggregator;
pub mod api;
pub mod catalog;
pub mod config;
pub mod playback;
pub mod types;

// Re-export configuration
pub use config::AppConfig;

// Re-export commonly used types
pub use types::{
    AgentTag, AnalysisResult, CancelReason, PlaybackOutcome, PlaybackStatus, Recommendation,
    ResultPayload, RiskItem, RiskLevel, SessionSnapshot, Step, StepStatus, Timeline,
};

// Re-export catalog and playback entry points
pub use catalog::{Catalog, CatalogError, CatalogRegistry, DocumentInfo, DualCatalog};
pub use playback::{
    DualPlayback, EventBus, PlaybackError, PlaybackEvent, PlaybackMode, PlaybackObserver,
    PlaybackScheduler, RunHandle, SurfaceRegistry,
};
