//! Step payloads and the accumulated analysis result

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Recommendation, RiskItem};

/// Literal content revealed when a step completes.
///
/// List fields are appended to the running result, scalar fields replace it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risks: Vec<RiskItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Recommendation>,
    /// Named scalar metrics ("terms_extracted", "pages_processed", ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    /// Model confidence reported by this stage (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Free-text summary line; the latest one wins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ResultPayload {
    pub fn findings<I, S>(findings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            findings: findings.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_risk(mut self, risk: RiskItem) -> Self {
        self.risks.push(risk);
        self
    }

    pub fn with_recommendation(mut self, recommendation: Recommendation) -> Self {
        self.recommendations.push(recommendation);
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
            && self.risks.is_empty()
            && self.recommendations.is_empty()
            && self.metrics.is_empty()
            && self.confidence.is_none()
            && self.summary.is_none()
    }
}

/// Result folded from every completed step of a session.
///
/// Grows monotonically while a session runs; the copy handed to
/// `on_complete` is a self-contained snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub findings: Vec<String>,
    pub risks: Vec<RiskItem>,
    pub recommendations: Vec<Recommendation>,
    pub metrics: BTreeMap<String, f64>,
    pub confidence: Option<f64>,
    pub summary: Option<String>,
    /// Step ids folded into this result, in merge order
    pub merged_steps: Vec<String>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.merged_steps.is_empty()
    }
}
