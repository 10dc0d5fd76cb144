//! Risk vocabulary shared by catalog content and display
//!
//! The demo content historically spelled severity three different ways
//! (`"high"`, `"HIGH"`, `"High"`, plus the occasional `"med"`). Everything is
//! funnelled into the single [`RiskLevel`] enum at the catalog boundary.

use serde::{Deserialize, Serialize};

use super::AgentTag;

/// Severity of a flagged clause or finding.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    #[serde(alias = "LOW", alias = "Low")]
    Low,
    #[serde(alias = "MEDIUM", alias = "Medium", alias = "med", alias = "moderate")]
    Medium,
    #[serde(alias = "HIGH", alias = "High", alias = "critical")]
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" | "med" | "moderate" => Ok(RiskLevel::Medium),
            "high" | "critical" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level '{other}'")),
        }
    }
}

/// A flagged risk in the analysed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskItem {
    pub title: String,
    #[serde(default)]
    pub detail: String,
    pub level: RiskLevel,
    /// Clause or section reference ("§4.2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,
    /// Simulated model that raised it; stamped from the step tag when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AgentTag>,
}

impl RiskItem {
    pub fn new(title: impl Into<String>, level: RiskLevel) -> Self {
        Self {
            title: title.into(),
            detail: String::new(),
            level,
            clause: None,
            source: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn at_clause(mut self, clause: impl Into<String>) -> Self {
        self.clause = Some(clause.into());
        self
    }
}

/// A suggested action for the reviewing attorney.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    #[serde(default)]
    pub priority: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AgentTag>,
}

impl Recommendation {
    pub fn new(text: impl Into<String>, priority: RiskLevel) -> Self {
        Self {
            text: text.into(),
            priority,
            source: None,
        }
    }
}
