//! Shared data structures for staged document-analysis playback
//!
//! - Step / AgentTag / StepStatus: one stage of a scripted pipeline
//! - RiskLevel / RiskItem / Recommendation: catalog content vocabulary
//! - ResultPayload / AnalysisResult: per-step content and its fold
//! - PlaybackStatus / SessionSnapshot / PlaybackOutcome: session lifecycle

mod step;
mod risk;
mod result;
mod session;

pub use step::*;
pub use risk::*;
pub use result::*;
pub use session::*;
