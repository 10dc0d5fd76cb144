//! Pipeline steps: the unit of scripted playback

use serde::{Deserialize, Serialize};

use super::ResultPayload;

// ============================================================================
// Agent Tag
// ============================================================================

/// Which simulated actor performed a step.
///
/// Purely descriptive: the scheduler treats every tag the same, the host view
/// uses it to group steps under the right model badge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentTag {
    /// Orchestration stages (upload, OCR, report assembly)
    #[default]
    System,
    /// GPT-4 Vision extraction track
    Extractor,
    /// Claude analysis track
    Analyzer,
    /// Cross-validation stages attributed to both models
    Both,
}

impl AgentTag {
    /// Display name of the simulated model behind this tag.
    pub fn model_label(&self) -> &'static str {
        match self {
            AgentTag::System => "Pipeline",
            AgentTag::Extractor => "GPT-4 Vision",
            AgentTag::Analyzer => "Claude",
            AgentTag::Both => "GPT-4 Vision + Claude",
        }
    }
}

impl std::fmt::Display for AgentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentTag::System => write!(f, "system"),
            AgentTag::Extractor => write!(f, "extractor"),
            AgentTag::Analyzer => write!(f, "analyzer"),
            AgentTag::Both => write!(f, "both"),
        }
    }
}

// ============================================================================
// Step
// ============================================================================

/// A single stage of a simulated analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Stable identifier, unique within its catalog
    pub id: String,
    /// Human-readable stage name ("Risk Assessment")
    pub label: String,
    /// Simulated actor, display grouping only
    #[serde(default)]
    pub agent_tag: AgentTag,
    /// Time the scheduler waits before marking this step complete
    pub simulated_duration_ms: u64,
    /// Literal findings merged into the running result on completion
    #[serde(default)]
    pub result_payload: ResultPayload,
}

impl Step {
    pub fn new(id: impl Into<String>, label: impl Into<String>, simulated_duration_ms: u64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            agent_tag: AgentTag::System,
            simulated_duration_ms,
            result_payload: ResultPayload::default(),
        }
    }

    pub fn tagged(mut self, tag: AgentTag) -> Self {
        self.agent_tag = tag;
        self
    }

    pub fn with_payload(mut self, payload: ResultPayload) -> Self {
        self.result_payload = payload;
        self
    }

    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.simulated_duration_ms)
    }
}

// ============================================================================
// Step Status
// ============================================================================

/// Per-step progress marker inside a playback session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Processing,
    Complete,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Processing => write!(f, "processing"),
            StepStatus::Complete => write!(f, "complete"),
        }
    }
}
