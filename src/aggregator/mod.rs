//! Result Aggregator - folds step payloads into the session result
//!
//! ## Merge Rules
//!
//! | Field                         | Rule                                   |
//! |-------------------------------|----------------------------------------|
//! | findings                      | append (no dedup)                      |
//! | risks / recommendations       | append, source stamped from step tag   |
//! | metrics                       | per-key overwrite, latest wins         |
//! | confidence / summary          | overwrite when the payload sets it     |
//!
//! Merge order is catalog order. The scheduler only ever has one step in
//! flight, so arrival order and catalog order coincide.
//!
//! Partitioning risks by severity is a read-time view ([`RiskBreakdown`]);
//! the stored result keeps the flat, ordered list.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{AnalysisResult, ResultPayload, RiskItem, RiskLevel, Step};

// ============================================================================
// Merge
// ============================================================================

/// Fold one payload into the accumulated result.
pub fn merge(mut accumulated: AnalysisResult, payload: &ResultPayload) -> AnalysisResult {
    accumulated.findings.extend(payload.findings.iter().cloned());
    accumulated.risks.extend(payload.risks.iter().cloned());
    accumulated
        .recommendations
        .extend(payload.recommendations.iter().cloned());

    for (name, value) in &payload.metrics {
        accumulated.metrics.insert(name.clone(), *value);
    }
    if payload.confidence.is_some() {
        accumulated.confidence = payload.confidence;
    }
    if payload.summary.is_some() {
        accumulated.summary = payload.summary.clone();
    }

    accumulated
}

/// Fold a completed step: stamps the step's agent tag on unattributed
/// risks and recommendations, then merges and records the step id.
pub fn merge_step(accumulated: AnalysisResult, step: &Step) -> AnalysisResult {
    let mut payload = step.result_payload.clone();
    for risk in &mut payload.risks {
        risk.source.get_or_insert(step.agent_tag);
    }
    for rec in &mut payload.recommendations {
        rec.source.get_or_insert(step.agent_tag);
    }

    let mut merged = merge(accumulated, &payload);
    merged.merged_steps.push(step.id.clone());
    merged
}

/// Fold a whole sequence of steps in order.
pub fn fold<'a, I>(steps: I) -> AnalysisResult
where
    I: IntoIterator<Item = &'a Step>,
{
    steps
        .into_iter()
        .fold(AnalysisResult::default(), merge_step)
}

/// Combine the two tracks of a dual playback.
///
/// The extractor result always goes first so the combined result does not
/// depend on which track finished first. Analyzer scalars win.
pub fn combine(extractor: &AnalysisResult, analyzer: &AnalysisResult) -> AnalysisResult {
    let mut combined = extractor.clone();
    combined.findings.extend(analyzer.findings.iter().cloned());
    combined.risks.extend(analyzer.risks.iter().cloned());
    combined
        .recommendations
        .extend(analyzer.recommendations.iter().cloned());
    for (name, value) in &analyzer.metrics {
        combined.metrics.insert(name.clone(), *value);
    }
    if analyzer.confidence.is_some() {
        combined.confidence = analyzer.confidence;
    }
    if analyzer.summary.is_some() {
        combined.summary = analyzer.summary.clone();
    }
    combined
        .merged_steps
        .extend(analyzer.merged_steps.iter().cloned());
    combined
}

// ============================================================================
// Read-time Views
// ============================================================================

/// Partition risks with a caller-supplied classifier. Order within each
/// bucket follows the stored order.
pub fn partition_risks<K, F>(result: &AnalysisResult, classifier: F) -> BTreeMap<K, Vec<RiskItem>>
where
    K: Ord,
    F: Fn(&RiskItem) -> K,
{
    let mut buckets: BTreeMap<K, Vec<RiskItem>> = BTreeMap::new();
    for risk in &result.risks {
        buckets.entry(classifier(risk)).or_default().push(risk.clone());
    }
    buckets
}

/// Risks grouped by severity for the dashboard cards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskBreakdown {
    pub high: Vec<RiskItem>,
    pub medium: Vec<RiskItem>,
    pub low: Vec<RiskItem>,
}

impl RiskBreakdown {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let mut buckets = partition_risks(result, |r| r.level);
        Self {
            high: buckets.remove(&RiskLevel::High).unwrap_or_default(),
            medium: buckets.remove(&RiskLevel::Medium).unwrap_or_default(),
            low: buckets.remove(&RiskLevel::Low).unwrap_or_default(),
        }
    }

    pub fn total(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    /// Highest severity present, if any risk was flagged.
    pub fn worst(&self) -> Option<RiskLevel> {
        if !self.high.is_empty() {
            Some(RiskLevel::High)
        } else if !self.medium.is_empty() {
            Some(RiskLevel::Medium)
        } else if !self.low.is_empty() {
            Some(RiskLevel::Low)
        } else {
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentTag, Recommendation};

    fn step(id: &str, payload: ResultPayload) -> Step {
        Step::new(id, id, 100).with_payload(payload)
    }

    #[test]
    fn test_lists_append_in_catalog_order() {
        let steps = vec![
            step("intake", ResultPayload::findings(["doc received"])),
            step("extract", ResultPayload::findings(["47 terms extracted"])),
            step(
                "risk",
                ResultPayload::findings(["medium risk: broad confidentiality scope"]),
            ),
        ];
        let result = fold(&steps);
        assert_eq!(
            result.findings,
            vec![
                "doc received",
                "47 terms extracted",
                "medium risk: broad confidentiality scope"
            ]
        );
        assert_eq!(result.merged_steps, vec!["intake", "extract", "risk"]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let steps = vec![
            step("a", ResultPayload::findings(["same"])),
            step("b", ResultPayload::findings(["same"])),
        ];
        assert_eq!(fold(&steps).findings.len(), 2);
    }

    #[test]
    fn test_scalars_overwrite_only_when_set() {
        let steps = vec![
            step(
                "a",
                ResultPayload::default()
                    .with_confidence(0.82)
                    .with_metric("pages", 4.0),
            ),
            step("b", ResultPayload::default().with_metric("pages", 12.0)),
            step("c", ResultPayload::default().with_confidence(0.97)),
        ];
        let result = fold(&steps);
        assert_eq!(result.confidence, Some(0.97));
        assert_eq!(result.metrics.get("pages"), Some(&12.0));

        let unset = fold(&steps[..2]);
        assert_eq!(unset.confidence, Some(0.82));
    }

    #[test]
    fn test_merge_step_stamps_agent_source() {
        let tagged = step(
            "clauses",
            ResultPayload::default()
                .with_risk(RiskItem::new("Unlimited liability", RiskLevel::High))
                .with_recommendation(Recommendation::new("Add a cap", RiskLevel::High)),
        )
        .tagged(AgentTag::Analyzer);
        let result = merge_step(AnalysisResult::default(), &tagged);
        assert_eq!(result.risks[0].source, Some(AgentTag::Analyzer));
        assert_eq!(result.recommendations[0].source, Some(AgentTag::Analyzer));
    }

    #[test]
    fn test_merge_step_keeps_explicit_source() {
        let mut risk = RiskItem::new("Venue clause", RiskLevel::Low);
        risk.source = Some(AgentTag::Extractor);
        let s = step("x", ResultPayload::default().with_risk(risk)).tagged(AgentTag::Both);
        let result = merge_step(AnalysisResult::default(), &s);
        assert_eq!(result.risks[0].source, Some(AgentTag::Extractor));
    }

    #[test]
    fn test_combine_is_extractor_first() {
        let ext = fold(&[step("e1", ResultPayload::findings(["ocr done"]).with_confidence(0.9))]);
        let ana = fold(&[step("a1", ResultPayload::findings(["clause risk"]).with_confidence(0.95))]);
        let combined = combine(&ext, &ana);
        assert_eq!(combined.findings, vec!["ocr done", "clause risk"]);
        assert_eq!(combined.confidence, Some(0.95));
        assert_eq!(combined.merged_steps, vec!["e1", "a1"]);
    }

    #[test]
    fn test_risk_breakdown_partitions_without_mutating() {
        let result = fold(&[step(
            "risk",
            ResultPayload::default()
                .with_risk(RiskItem::new("Non-compete", RiskLevel::High))
                .with_risk(RiskItem::new("Term length", RiskLevel::Medium))
                .with_risk(RiskItem::new("Notice address", RiskLevel::Low))
                .with_risk(RiskItem::new("Assignment", RiskLevel::High)),
        )]);
        let breakdown = RiskBreakdown::from_result(&result);
        assert_eq!(breakdown.high.len(), 2);
        assert_eq!(breakdown.high[1].title, "Assignment");
        assert_eq!(breakdown.total(), 4);
        assert_eq!(breakdown.worst(), Some(RiskLevel::High));
        assert_eq!(result.risks.len(), 4);
    }

    #[test]
    fn test_partition_with_custom_classifier() {
        let result = fold(&[
            step(
                "a",
                ResultPayload::default().with_risk(RiskItem::new("r1", RiskLevel::Low)),
            )
            .tagged(AgentTag::Extractor),
            step(
                "b",
                ResultPayload::default().with_risk(RiskItem::new("r2", RiskLevel::Low)),
            )
            .tagged(AgentTag::Analyzer),
        ]);
        let by_agent = partition_risks(&result, |r| r.source.map(|s| s.to_string()));
        assert_eq!(by_agent.len(), 2);
        assert_eq!(by_agent[&Some("analyzer".to_string())][0].title, "r2");
    }

    #[test]
    fn test_empty_breakdown_has_no_worst() {
        assert_eq!(RiskBreakdown::default().worst(), None);
    }
}
