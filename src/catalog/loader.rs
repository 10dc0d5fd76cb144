//! TOML catalog files
//!
//! ```toml
//! [[document]]
//! subject_id = "lease"
//! title = "Commercial Lease"
//! document_type = "Lease"
//! pages = 18
//!
//! [[catalog]]
//! id = "lease"
//! title = "Lease Processor"
//!
//! [[catalog.step]]
//! id = "upload"
//! label = "Document Upload"
//! simulated_duration_ms = 600
//! result_payload = { findings = ["Document received"] }
//!
//! [[dual]]
//! subject_id = "lease"
//! extractor = "lease-extractor"
//! analyzer = "lease-analyzer"
//! ```
//!
//! Durations are read as signed integers so a negative value is reported as
//! such instead of as a type mismatch.

use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use super::{Catalog, CatalogError, CatalogRegistry, DocumentInfo};
use crate::types::{AgentTag, ResultPayload, Step};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default, rename = "document")]
    documents: Vec<DocumentInfo>,
    #[serde(default, rename = "catalog")]
    catalogs: Vec<RawCatalog>,
    #[serde(default, rename = "dual")]
    duals: Vec<RawDual>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    expected_total_duration_ms: Option<i64>,
    #[serde(default, rename = "step")]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    id: String,
    label: String,
    #[serde(default)]
    agent_tag: AgentTag,
    simulated_duration_ms: i64,
    #[serde(default)]
    result_payload: ResultPayload,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDual {
    subject_id: String,
    extractor: String,
    analyzer: String,
}

fn non_negative(catalog: &str, step: &str, value: i64) -> Result<u64, CatalogError> {
    u64::try_from(value).map_err(|_| CatalogError::NegativeDuration {
        catalog: catalog.to_string(),
        step: step.to_string(),
        value,
    })
}

impl RawCatalog {
    fn into_catalog(self) -> Result<Catalog, CatalogError> {
        let steps = self
            .steps
            .into_iter()
            .map(|raw| {
                let ms = non_negative(&self.id, &raw.id, raw.simulated_duration_ms)?;
                Ok(Step {
                    id: raw.id,
                    label: raw.label,
                    agent_tag: raw.agent_tag,
                    simulated_duration_ms: ms,
                    result_payload: raw.result_payload,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        let expected = match self.expected_total_duration_ms {
            Some(value) => Some(u64::try_from(value).map_err(|_| {
                CatalogError::NegativeExpectedTotal {
                    catalog: self.id.clone(),
                    value,
                }
            })?),
            None => None,
        };

        Catalog::new(self.id, self.title, steps, expected)
    }
}

/// Parse and validate catalog file content, then merge it into `registry`.
///
/// Everything is validated before anything is inserted, so a bad file
/// leaves the registry untouched. Returns the number of catalogs added or
/// replaced.
pub fn merge_str(
    registry: &mut CatalogRegistry,
    content: &str,
    origin: &str,
) -> Result<usize, CatalogError> {
    let file: CatalogFile = toml::from_str(content).map_err(|source| CatalogError::Parse {
        path: origin.to_string(),
        source,
    })?;

    let catalogs = file
        .catalogs
        .into_iter()
        .map(RawCatalog::into_catalog)
        .collect::<Result<Vec<_>, _>>()?;

    for dual in &file.duals {
        for referenced in [&dual.extractor, &dual.analyzer] {
            let known = registry.contains(referenced) || catalogs.iter().any(|c| c.id() == referenced);
            if !known {
                return Err(CatalogError::DanglingReference {
                    subject: dual.subject_id.clone(),
                    catalog: referenced.clone(),
                });
            }
        }
    }

    let count = catalogs.len();
    for catalog in catalogs {
        debug!(catalog = %catalog.id(), steps = catalog.len(), origin, "Catalog loaded");
        registry.insert_catalog(catalog);
    }
    for document in file.documents {
        registry.insert_document(document);
    }
    for dual in file.duals {
        registry.insert_dual(dual.subject_id, &dual.extractor, &dual.analyzer)?;
    }
    Ok(count)
}

/// Read a catalog file from disk and merge it into `registry`.
pub fn merge_file(registry: &mut CatalogRegistry, path: &Path) -> Result<usize, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    merge_str(registry, &content, &path.display().to_string())
}
