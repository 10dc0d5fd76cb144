//! Built-in sample document library
//!
//! Every subject gets a six-stage processor catalog (`<subject>`) and a pair
//! of dual timelines (`<subject>-extractor`, `<subject>-analyzer`). The
//! content is literal; nothing here is computed from the document.

use super::{Catalog, CatalogError, CatalogRegistry, DocumentInfo};
use crate::types::{AgentTag, Recommendation, ResultPayload, RiskItem, RiskLevel, Step};

/// The three-step walkthrough used in the README and the timing tests.
pub const NDA_DEMO: &str = "nda-demo";

pub fn register(registry: &mut CatalogRegistry) -> Result<(), CatalogError> {
    registry.insert_catalog(nda_demo()?);

    for doc in library() {
        let subject = doc.info.subject_id.clone();
        registry.insert_document(doc.info);
        registry.insert_catalog(Catalog::new(
            subject.clone(),
            format!("{} - Document Processor", doc.title_short),
            doc.processor,
            None,
        )?);

        let extractor_id = format!("{subject}-extractor");
        let analyzer_id = format!("{subject}-analyzer");
        registry.insert_catalog(Catalog::new(
            extractor_id.clone(),
            format!("{} - GPT-4 Vision", doc.title_short),
            doc.extractor,
            None,
        )?);
        registry.insert_catalog(Catalog::new(
            analyzer_id.clone(),
            format!("{} - Claude", doc.title_short),
            doc.analyzer,
            None,
        )?);
        registry.insert_dual(subject, &extractor_id, &analyzer_id)?;
    }
    Ok(())
}

fn nda_demo() -> Result<Catalog, CatalogError> {
    Catalog::new(
        NDA_DEMO,
        "NDA Quick Demo",
        vec![
            Step::new("intake", "Document Intake", 500)
                .with_payload(ResultPayload::findings(["doc received"])),
            Step::new("extract", "Term Extraction", 1000)
                .tagged(AgentTag::Extractor)
                .with_payload(ResultPayload::findings(["47 terms extracted"])),
            Step::new("risk", "Risk Assessment", 800)
                .tagged(AgentTag::Analyzer)
                .with_payload(ResultPayload::findings([
                    "medium risk: broad confidentiality scope",
                ])),
        ],
        None,
    )
}

struct SampleDocument {
    info: DocumentInfo,
    title_short: &'static str,
    processor: Vec<Step>,
    extractor: Vec<Step>,
    analyzer: Vec<Step>,
}

fn info(subject_id: &str, title: &str, document_type: &str, pages: u32) -> DocumentInfo {
    DocumentInfo {
        subject_id: subject_id.to_string(),
        title: title.to_string(),
        document_type: document_type.to_string(),
        pages,
        has_dual: false,
    }
}

fn risk(title: &str, level: RiskLevel, clause: &str, detail: &str) -> RiskItem {
    RiskItem::new(title, level).at_clause(clause).with_detail(detail)
}

fn rec(text: &str, priority: RiskLevel) -> Recommendation {
    Recommendation::new(text, priority)
}

/// Upload and OCR stages shared by every processor catalog.
fn intake_steps(pages: u32, ocr_ms: u64, ocr_confidence: f64) -> Vec<Step> {
    vec![
        Step::new("upload", "Document Upload", 600).with_payload(
            ResultPayload::findings(["Document received and queued"])
                .with_metric("pages", f64::from(pages)),
        ),
        Step::new("ocr", "OCR & Text Extraction", ocr_ms)
            .tagged(AgentTag::Extractor)
            .with_payload(
                ResultPayload::findings([format!("{pages} pages digitised")])
                    .with_metric("pages_processed", f64::from(pages))
                    .with_confidence(ocr_confidence),
            ),
    ]
}

fn report_step(summary: &str, hours_saved: f64) -> Step {
    Step::new("report", "Report Generation", 700).with_payload(
        ResultPayload::default()
            .with_metric("hours_saved", hours_saved)
            .with_summary(summary),
    )
}

fn library() -> Vec<SampleDocument> {
    vec![nda(), deposition(), service_contract(), discovery_request()]
}

// ============================================================================
// NDA
// ============================================================================

fn nda() -> SampleDocument {
    let mut processor = intake_steps(4, 1200, 0.96);
    processor.extend([
        Step::new("clauses", "Clause Extraction", 1500)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::findings([
                    "47 terms extracted",
                    "Mutual confidentiality obligations identified",
                ])
                .with_metric("clauses", 14.0),
            ),
        Step::new("risk", "Risk Assessment", 1800)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::default()
                    .with_risk(risk(
                        "Broad confidentiality scope",
                        RiskLevel::Medium,
                        "§2.1",
                        "Definition covers all information disclosed in any form, marked or not",
                    ))
                    .with_risk(risk(
                        "Perpetual survival term",
                        RiskLevel::High,
                        "§7.3",
                        "Obligations survive termination with no end date",
                    ))
                    .with_risk(risk(
                        "Standard carve-outs present",
                        RiskLevel::Low,
                        "§2.3",
                        "Public domain and independently developed information excluded",
                    ))
                    .with_confidence(0.91),
            ),
        Step::new("recommendations", "Recommendations", 1100)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::default()
                    .with_recommendation(rec(
                        "Limit the survival period to three years after termination",
                        RiskLevel::High,
                    ))
                    .with_recommendation(rec(
                        "Require written designation of confidential information",
                        RiskLevel::Medium,
                    )),
            ),
        report_step("Mutual NDA with one high-risk survival clause", 2.5),
    ]);

    SampleDocument {
        info: info("nda", "Mutual Non-Disclosure Agreement", "NDA", 4),
        title_short: "NDA",
        processor,
        extractor: vec![
            Step::new("scan", "Page Scan", 700)
                .tagged(AgentTag::Extractor)
                .with_payload(ResultPayload::findings(["4 pages scanned"])),
            Step::new("layout", "Layout Detection", 900)
                .tagged(AgentTag::Extractor)
                .with_payload(
                    ResultPayload::findings(["Signature blocks located on page 4"])
                        .with_metric("signature_blocks", 2.0),
                ),
            Step::new("entities", "Party & Date Extraction", 1100)
                .tagged(AgentTag::Extractor)
                .with_payload(
                    ResultPayload::findings([
                        "Parties: Meridian Labs Inc. and Corvex Partners LLC",
                        "Effective date: March 1, 2024",
                    ])
                    .with_confidence(0.97),
                ),
        ],
        analyzer: vec![
            Step::new("context", "Context Analysis", 800)
                .tagged(AgentTag::Analyzer)
                .with_payload(ResultPayload::findings(["Mutual disclosure structure"])),
            Step::new("obligations", "Obligation Mapping", 1300)
                .tagged(AgentTag::Analyzer)
                .with_payload(
                    ResultPayload::findings(["47 terms extracted"])
                        .with_risk(risk(
                            "Perpetual survival term",
                            RiskLevel::High,
                            "§7.3",
                            "No sunset on confidentiality obligations",
                        ))
                        .with_risk(risk(
                            "Broad confidentiality scope",
                            RiskLevel::Medium,
                            "§2.1",
                            "Oral disclosures covered without written confirmation",
                        )),
                ),
            Step::new("remedies", "Remedies Review", 900)
                .tagged(AgentTag::Analyzer)
                .with_payload(
                    ResultPayload::default()
                        .with_risk(risk(
                            "Injunctive relief without bond",
                            RiskLevel::Low,
                            "§9.2",
                            "Common in NDAs; acceptable",
                        ))
                        .with_recommendation(rec(
                            "Cap the survival term at three years",
                            RiskLevel::High,
                        )),
                ),
            Step::new("cross-validate", "Cross-Validation", 600)
                .tagged(AgentTag::Both)
                .with_payload(
                    ResultPayload::default()
                        .with_confidence(0.94)
                        .with_summary("Both models agree: sign after narrowing §2.1 and §7.3"),
                ),
        ],
    }
}

// ============================================================================
// Deposition
// ============================================================================

fn deposition() -> SampleDocument {
    let mut processor = intake_steps(86, 2600, 0.93);
    processor.extend([
        Step::new("clauses", "Testimony Segmentation", 2200)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::findings([
                    "312 question-answer pairs segmented",
                    "11 exhibits referenced",
                ])
                .with_metric("qa_pairs", 312.0)
                .with_metric("exhibits", 11.0),
            ),
        Step::new("risk", "Inconsistency Detection", 2400)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::default()
                    .with_risk(risk(
                        "Timeline contradiction",
                        RiskLevel::High,
                        "p. 42:7-19",
                        "Witness places the delivery on June 3, contradicting Exhibit 14",
                    ))
                    .with_risk(risk(
                        "Hearsay reliance",
                        RiskLevel::Medium,
                        "p. 57:2-11",
                        "Statement attributed to dispatcher not present at deposition",
                    ))
                    .with_risk(risk(
                        "Leading questions by counsel",
                        RiskLevel::Low,
                        "p. 63:4",
                        "Objection preserved on the record",
                    ))
                    .with_confidence(0.88),
            ),
        Step::new("recommendations", "Follow-up Strategy", 1300)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::default()
                    .with_recommendation(rec(
                        "Impeach with Exhibit 14 delivery log at trial",
                        RiskLevel::High,
                    ))
                    .with_recommendation(rec(
                        "Subpoena the dispatcher for a supplemental deposition",
                        RiskLevel::Medium,
                    )),
            ),
        report_step("Deposition summary with one impeachable contradiction", 9.0),
    ]);

    SampleDocument {
        info: info(
            "deposition",
            "Deposition Transcript - Harper v. Kline Logistics",
            "Deposition",
            86,
        ),
        title_short: "Deposition",
        processor,
        extractor: vec![
            Step::new("scan", "Transcript Scan", 1800)
                .tagged(AgentTag::Extractor)
                .with_payload(ResultPayload::findings(["86 pages scanned"])),
            Step::new("speakers", "Speaker Attribution", 1400)
                .tagged(AgentTag::Extractor)
                .with_payload(
                    ResultPayload::findings(["3 speakers identified"])
                        .with_metric("speakers", 3.0),
                ),
            Step::new("exhibits", "Exhibit Indexing", 1000)
                .tagged(AgentTag::Extractor)
                .with_payload(
                    ResultPayload::findings(["11 exhibits indexed"]).with_confidence(0.95),
                ),
            Step::new("timestamps", "Timestamp Alignment", 800)
                .tagged(AgentTag::Extractor)
                .with_payload(ResultPayload::findings(["Video timestamps aligned"])),
        ],
        analyzer: vec![
            Step::new("narrative", "Narrative Reconstruction", 1600)
                .tagged(AgentTag::Analyzer)
                .with_payload(ResultPayload::findings([
                    "Witness account reconstructed across 4 sessions",
                ])),
            Step::new("consistency", "Consistency Check", 2000)
                .tagged(AgentTag::Analyzer)
                .with_payload(
                    ResultPayload::default()
                        .with_risk(risk(
                            "Timeline contradiction",
                            RiskLevel::High,
                            "p. 42:7-19",
                            "Conflicts with Exhibit 14",
                        ))
                        .with_risk(risk(
                            "Vague answers on safety training",
                            RiskLevel::Medium,
                            "p. 71:3-22",
                            "Repeated \"I don't recall\" responses",
                        )),
                ),
            Step::new("strategy", "Strategy Notes", 1200)
                .tagged(AgentTag::Analyzer)
                .with_payload(ResultPayload::default().with_recommendation(rec(
                    "Prepare impeachment outline for cross-examination",
                    RiskLevel::High,
                ))),
            Step::new("cross-validate", "Cross-Validation", 700)
                .tagged(AgentTag::Both)
                .with_payload(
                    ResultPayload::default()
                        .with_confidence(0.9)
                        .with_summary("Contradiction at p. 42 confirmed against exhibit index"),
                ),
        ],
    }
}

// ============================================================================
// Service Contract
// ============================================================================

fn service_contract() -> SampleDocument {
    let mut processor = intake_steps(23, 1800, 0.95);
    processor.extend([
        Step::new("clauses", "Clause Extraction", 2000)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::findings([
                    "38 clauses extracted",
                    "SLA schedule attached as Exhibit B",
                ])
                .with_metric("clauses", 38.0),
            ),
        Step::new("risk", "Risk Assessment", 2100)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::default()
                    .with_risk(risk(
                        "Uncapped indemnification",
                        RiskLevel::High,
                        "§11.1",
                        "Customer indemnifies provider for all third-party claims without limit",
                    ))
                    .with_risk(risk(
                        "Auto-renewal with 90-day notice",
                        RiskLevel::Medium,
                        "§3.2",
                        "Renews for successive 12-month terms",
                    ))
                    .with_risk(risk(
                        "Unilateral price adjustment",
                        RiskLevel::Medium,
                        "§5.4",
                        "Provider may raise fees up to 8% per renewal",
                    ))
                    .with_risk(risk(
                        "Governing law: Delaware",
                        RiskLevel::Low,
                        "§14.1",
                        "Neutral forum",
                    ))
                    .with_confidence(0.89),
            ),
        Step::new("recommendations", "Recommendations", 1400)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::default()
                    .with_recommendation(rec(
                        "Negotiate a mutual indemnity capped at 12 months of fees",
                        RiskLevel::High,
                    ))
                    .with_recommendation(rec(
                        "Shorten the renewal notice window to 30 days",
                        RiskLevel::Medium,
                    ))
                    .with_recommendation(rec(
                        "Tie price increases to CPI",
                        RiskLevel::Medium,
                    )),
            ),
        report_step("MSA with uncapped indemnity; renegotiate before signature", 6.0),
    ]);

    SampleDocument {
        info: info(
            "service-contract",
            "Master Services Agreement - Northwind Cloud",
            "Service Contract",
            23,
        ),
        title_short: "Service Contract",
        processor,
        extractor: vec![
            Step::new("scan", "Page Scan", 1200)
                .tagged(AgentTag::Extractor)
                .with_payload(ResultPayload::findings(["23 pages scanned"])),
            Step::new("tables", "Table Extraction", 1500)
                .tagged(AgentTag::Extractor)
                .with_payload(
                    ResultPayload::findings(["SLA table: 99.9% uptime, 4h response"])
                        .with_metric("uptime_commitment", 99.9),
                ),
            Step::new("fees", "Fee Schedule Extraction", 900)
                .tagged(AgentTag::Extractor)
                .with_payload(
                    ResultPayload::findings(["Annual fee: $184,000"])
                        .with_metric("annual_fee_usd", 184_000.0)
                        .with_confidence(0.96),
                ),
        ],
        analyzer: vec![
            Step::new("structure", "Structure Analysis", 900)
                .tagged(AgentTag::Analyzer)
                .with_payload(ResultPayload::findings(["38 clauses extracted"])),
            Step::new("liability", "Liability Review", 1700)
                .tagged(AgentTag::Analyzer)
                .with_payload(
                    ResultPayload::default()
                        .with_risk(risk(
                            "Uncapped indemnification",
                            RiskLevel::High,
                            "§11.1",
                            "No cap or carve-back for provider negligence",
                        ))
                        .with_risk(risk(
                            "Limitation of liability excludes data loss",
                            RiskLevel::High,
                            "§12.2",
                            "Provider disclaims liability for customer data",
                        )),
                ),
            Step::new("commercial", "Commercial Terms", 1100)
                .tagged(AgentTag::Analyzer)
                .with_payload(
                    ResultPayload::default()
                        .with_risk(risk(
                            "Auto-renewal with 90-day notice",
                            RiskLevel::Medium,
                            "§3.2",
                            "Easy to miss the opt-out window",
                        ))
                        .with_recommendation(rec(
                            "Add a data-loss carve-out to the liability cap",
                            RiskLevel::High,
                        )),
                ),
            Step::new("benchmark", "Market Benchmark", 800)
                .tagged(AgentTag::Analyzer)
                .with_payload(ResultPayload::findings([
                    "Fees within 5% of comparable SaaS agreements",
                ])),
            Step::new("cross-validate", "Cross-Validation", 600)
                .tagged(AgentTag::Both)
                .with_payload(
                    ResultPayload::default()
                        .with_confidence(0.92)
                        .with_summary("Fee table matches §5; liability terms need redlines"),
                ),
        ],
    }
}

// ============================================================================
// Discovery Request
// ============================================================================

fn discovery_request() -> SampleDocument {
    let mut processor = intake_steps(12, 1400, 0.97);
    processor.extend([
        Step::new("clauses", "Request Parsing", 1600)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::findings([
                    "27 requests for production parsed",
                    "Response due within 30 days of service",
                ])
                .with_metric("requests", 27.0),
            ),
        Step::new("risk", "Objection Analysis", 1900)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::default()
                    .with_risk(risk(
                        "Overbroad time period",
                        RiskLevel::High,
                        "RFP No. 4",
                        "Seeks all communications since 2010",
                    ))
                    .with_risk(risk(
                        "Privileged material requested",
                        RiskLevel::High,
                        "RFP No. 9",
                        "Requests counsel correspondence regarding the incident",
                    ))
                    .with_risk(risk(
                        "Undefined term \"relevant personnel\"",
                        RiskLevel::Medium,
                        "Definitions ¶6",
                        "Ambiguous scope of custodians",
                    ))
                    .with_confidence(0.9),
            ),
        Step::new("recommendations", "Response Strategy", 1200)
            .tagged(AgentTag::Analyzer)
            .with_payload(
                ResultPayload::default()
                    .with_recommendation(rec(
                        "Object to RFP No. 4 as overbroad; offer a 2019-present window",
                        RiskLevel::High,
                    ))
                    .with_recommendation(rec(
                        "Serve a privilege log for RFP No. 9",
                        RiskLevel::High,
                    ))
                    .with_recommendation(rec(
                        "Meet and confer on the definition of relevant personnel",
                        RiskLevel::Medium,
                    )),
            ),
        report_step("27 requests; objections drafted for 2 high-risk items", 4.5),
    ]);

    SampleDocument {
        info: info(
            "discovery-request",
            "Plaintiff's First Set of Requests for Production",
            "Discovery Request",
            12,
        ),
        title_short: "Discovery Request",
        processor,
        extractor: vec![
            Step::new("scan", "Page Scan", 900)
                .tagged(AgentTag::Extractor)
                .with_payload(ResultPayload::findings(["12 pages scanned"])),
            Step::new("numbering", "Request Numbering", 700)
                .tagged(AgentTag::Extractor)
                .with_payload(
                    ResultPayload::findings(["27 numbered requests detected"])
                        .with_confidence(0.98),
                ),
        ],
        analyzer: vec![
            Step::new("definitions", "Definitions Review", 1000)
                .tagged(AgentTag::Analyzer)
                .with_payload(ResultPayload::default().with_risk(risk(
                    "Undefined term \"relevant personnel\"",
                    RiskLevel::Medium,
                    "Definitions ¶6",
                    "Custodian scope unclear",
                ))),
            Step::new("scope", "Scope Analysis", 1500)
                .tagged(AgentTag::Analyzer)
                .with_payload(
                    ResultPayload::default()
                        .with_risk(risk(
                            "Overbroad time period",
                            RiskLevel::High,
                            "RFP No. 4",
                            "Fourteen-year lookback",
                        ))
                        .with_risk(risk(
                            "Privileged material requested",
                            RiskLevel::High,
                            "RFP No. 9",
                            "Attorney-client communications",
                        )),
                ),
            Step::new("deadlines", "Deadline Calculation", 600)
                .tagged(AgentTag::Analyzer)
                .with_payload(
                    ResultPayload::findings(["Responses due April 18, 2024"])
                        .with_recommendation(rec(
                            "Calendar the response deadline and a 7-day internal review",
                            RiskLevel::Medium,
                        )),
                ),
            Step::new("cross-validate", "Cross-Validation", 500)
                .tagged(AgentTag::Both)
                .with_payload(
                    ResultPayload::default()
                        .with_confidence(0.93)
                        .with_summary("Request count and numbering verified by both models"),
                ),
        ],
    }
}
