//! Catalog File Integration Tests
//!
//! Loads TOML catalog files from disk over the built-in library and plays
//! the result, covering the load-time validation that keeps malformed
//! catalogs from ever reaching playback.

use briefcast::catalog::{CatalogError, CatalogRegistry};
use briefcast::playback::{PlaybackMode, RealtimePacer, SurfaceRegistry};
use briefcast::types::{AgentTag, PlaybackOutcome, RiskLevel};

use std::io::Write;
use std::sync::Arc;
use tokio::time::Instant;

const LEASE: &str = r#"
[[document]]
subject_id = "lease"
title = "Commercial Lease"
document_type = "Lease"
pages = 18

[[catalog]]
id = "lease"
title = "Lease Processor"

[[catalog.step]]
id = "upload"
label = "Document Upload"
simulated_duration_ms = 400
result_payload = { findings = ["Lease received"] }

[[catalog.step]]
id = "risk"
label = "Risk Assessment"
agent_tag = "analyzer"
simulated_duration_ms = 900

[catalog.step.result_payload]
confidence = 0.88

[[catalog.step.result_payload.risks]]
title = "Uncapped CAM charges"
level = "HIGH"
clause = "§5.4"

[[catalog.step.result_payload.risks]]
title = "Renewal notice window"
level = "med"

[[catalog]]
id = "lease-extractor"
title = "Lease - GPT-4 Vision"

[[catalog.step]]
id = "scan"
label = "Page Scan"
agent_tag = "extractor"
simulated_duration_ms = 300

[[catalog]]
id = "lease-analyzer"
title = "Lease - Claude"

[[catalog.step]]
id = "terms"
label = "Term Review"
agent_tag = "analyzer"
simulated_duration_ms = 500

[[dual]]
subject_id = "lease"
extractor = "lease-extractor"
analyzer = "lease-analyzer"
"#;

fn write_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn file_catalogs_merge_over_builtins() {
    let file = write_file(LEASE);
    let registry = CatalogRegistry::builtin_with_file(file.path()).unwrap();

    // Built-ins survive.
    assert!(registry.contains("nda-demo"));
    assert!(registry.document("nda").is_some());

    let lease = registry.get_catalog("lease").unwrap();
    assert_eq!(lease.len(), 2);
    assert_eq!(lease.expected_total_duration_ms(), 1300);
    assert_eq!(lease.steps()[1].agent_tag, AgentTag::Analyzer);

    let levels: Vec<RiskLevel> = lease.steps()[1]
        .result_payload
        .risks
        .iter()
        .map(|r| r.level)
        .collect();
    assert_eq!(levels, vec![RiskLevel::High, RiskLevel::Medium]);

    let doc = registry.document("lease").unwrap();
    assert_eq!(doc.pages, 18);
    assert!(doc.has_dual);
}

#[tokio::test(start_paused = true)]
async fn file_catalog_plays_like_a_builtin() {
    let file = write_file(LEASE);
    let registry = Arc::new(CatalogRegistry::builtin_with_file(file.path()).unwrap());
    let surfaces = SurfaceRegistry::new(
        registry,
        Arc::new(RealtimePacer::default()),
        Vec::new(),
        None,
    );

    let t0 = Instant::now();
    let outcome = surfaces
        .start("viewer", "lease", PlaybackMode::Single)
        .unwrap()
        .finished()
        .await;
    assert_eq!(t0.elapsed().as_millis(), 1300);

    let PlaybackOutcome::Completed(result) = outcome else {
        panic!("lease should complete");
    };
    assert_eq!(result.findings, vec!["Lease received"]);
    assert_eq!(result.risks.len(), 2);
    assert!(result
        .risks
        .iter()
        .all(|r| r.source == Some(AgentTag::Analyzer)));
    assert_eq!(result.confidence, Some(0.88));

    // Dual: the longer analyzer timeline decides completion.
    let t1 = Instant::now();
    let dual = surfaces
        .start("viewer", "lease", PlaybackMode::Dual)
        .unwrap()
        .finished()
        .await;
    assert!(dual.is_completed());
    assert_eq!(t1.elapsed().as_millis(), 500);
}

#[test]
fn negative_duration_is_rejected_at_load() {
    let file = write_file(
        r#"
[[catalog]]
id = "broken"

[[catalog.step]]
id = "upload"
label = "Upload"
simulated_duration_ms = -250
"#,
    );
    let err = CatalogRegistry::builtin_with_file(file.path()).unwrap_err();
    assert!(matches!(
        err,
        CatalogError::NegativeDuration { ref catalog, ref step, value: -250 }
            if catalog == "broken" && step == "upload"
    ));
}

#[test]
fn duplicate_step_ids_are_rejected_at_load() {
    let file = write_file(
        r#"
[[catalog]]
id = "twice"

[[catalog.step]]
id = "ocr"
label = "OCR"
simulated_duration_ms = 100

[[catalog.step]]
id = "ocr"
label = "OCR again"
simulated_duration_ms = 100
"#,
    );
    let err = CatalogRegistry::builtin_with_file(file.path()).unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateStep { .. }));
}

#[test]
fn unknown_risk_level_is_a_parse_error() {
    let file = write_file(
        r#"
[[catalog]]
id = "odd"

[[catalog.step]]
id = "risk"
label = "Risk"
simulated_duration_ms = 100
result_payload = { risks = [{ title = "x", level = "apocalyptic" }] }
"#,
    );
    let err = CatalogRegistry::builtin_with_file(file.path()).unwrap_err();
    assert!(matches!(err, CatalogError::Parse { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = CatalogRegistry::builtin_with_file(std::path::Path::new("/nonexistent/catalogs.toml"))
        .unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }));
}
