//! Step Catalog - immutable, per-subject ordered step lists
//!
//! A [`Catalog`] is validated once at construction and shared as
//! `Arc<Catalog>` afterwards; nothing in the playback path can mutate it.
//!
//! Lookup policy for unknown subject ids is fail-closed: [`CatalogRegistry::get_catalog`]
//! returns [`CatalogError::UnknownSubject`] and the caller decides whether to
//! fall back to a default subject.

pub mod documents;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::Step;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("Catalog id must not be blank")]
    BlankCatalogId,

    #[error("Catalog {0} has no steps")]
    Empty(String),

    #[error("Catalog {catalog}: step #{index} has a blank id")]
    BlankStepId { catalog: String, index: usize },

    #[error("Catalog {catalog}: duplicate step id '{step}'")]
    DuplicateStep { catalog: String, step: String },

    #[error("Catalog {catalog}: step '{step}' has negative duration ({value} ms)")]
    NegativeDuration {
        catalog: String,
        step: String,
        value: i64,
    },

    #[error("Catalog {catalog}: step durations overflow at step '{step}'")]
    DurationOverflow { catalog: String, step: String },

    #[error("Catalog {catalog}: negative expected total duration ({value} ms)")]
    NegativeExpectedTotal { catalog: String, value: i64 },

    #[error("Dual pairing for {subject} references missing catalog '{catalog}'")]
    DanglingReference { subject: String, catalog: String },

    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse catalog file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

// ============================================================================
// Catalog
// ============================================================================

/// Ordered, validated step list for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    id: String,
    title: String,
    steps: Vec<Step>,
    expected_total_duration_ms: u64,
}

impl Catalog {
    /// Build and validate a catalog.
    ///
    /// `expected_total_duration_ms` defaults to the sum of step durations.
    /// A declared total that disagrees with the sum is kept as declared and
    /// logged; progress never reads it.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        steps: Vec<Step>,
        expected_total_duration_ms: Option<u64>,
    ) -> Result<Self, CatalogError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CatalogError::BlankCatalogId);
        }
        if steps.is_empty() {
            return Err(CatalogError::Empty(id));
        }

        let mut seen = HashSet::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(CatalogError::BlankStepId { catalog: id, index });
            }
            if !seen.insert(step.id.as_str()) {
                return Err(CatalogError::DuplicateStep {
                    catalog: id,
                    step: step.id.clone(),
                });
            }
        }

        let mut summed: u64 = 0;
        for step in &steps {
            summed = summed
                .checked_add(step.simulated_duration_ms)
                .ok_or_else(|| CatalogError::DurationOverflow {
                    catalog: id.clone(),
                    step: step.id.clone(),
                })?;
        }
        let expected = match expected_total_duration_ms {
            Some(declared) if declared != summed => {
                warn!(
                    catalog = %id,
                    declared_ms = declared,
                    summed_ms = summed,
                    "Expected total duration differs from step sum"
                );
                declared
            }
            Some(declared) => declared,
            None => summed,
        };

        let mut title = title.into();
        if title.trim().is_empty() {
            title = id.clone();
        }

        Ok(Self {
            id,
            title,
            steps,
            expected_total_duration_ms: expected,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a constructed catalog.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn expected_total_duration_ms(&self) -> u64 {
        self.expected_total_duration_ms
    }

    /// Checked at construction, so this cannot overflow.
    pub fn summed_duration_ms(&self) -> u64 {
        self.steps
            .iter()
            .fold(0, |acc: u64, s| acc.saturating_add(s.simulated_duration_ms))
    }
}

/// Two independent timelines played side by side for one subject.
#[derive(Debug, Clone, Serialize)]
pub struct DualCatalog {
    pub subject_id: String,
    /// GPT-4 Vision track
    pub extractor: Arc<Catalog>,
    /// Claude track
    pub analyzer: Arc<Catalog>,
}

/// Library entry for a sample document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub subject_id: String,
    pub title: String,
    pub document_type: String,
    pub pages: u32,
    #[serde(default)]
    pub has_dual: bool,
}

// ============================================================================
// Registry
// ============================================================================

/// Lookup table from subject id to catalogs.
#[derive(Debug, Default)]
pub struct CatalogRegistry {
    catalogs: BTreeMap<String, Arc<Catalog>>,
    duals: BTreeMap<String, DualCatalog>,
    documents: Vec<DocumentInfo>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the sample document library.
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut registry = Self::new();
        documents::register(&mut registry)?;
        debug!(
            catalogs = registry.catalogs.len(),
            documents = registry.documents.len(),
            "Built-in catalogs registered"
        );
        Ok(registry)
    }

    /// Built-ins with a catalog file merged over them.
    pub fn builtin_with_file(path: &Path) -> Result<Self, CatalogError> {
        let mut registry = Self::builtin()?;
        let added = loader::merge_file(&mut registry, path)?;
        info!(path = %path.display(), catalogs = added, "Loaded catalog file");
        Ok(registry)
    }

    /// Register a catalog, replacing any previous one with the same id.
    pub fn insert_catalog(&mut self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        if self
            .catalogs
            .insert(catalog.id().to_string(), Arc::clone(&catalog))
            .is_some()
        {
            debug!(catalog = %catalog.id(), "Replaced existing catalog");
        }
        catalog
    }

    /// Pair two registered catalogs as the dual timelines of a subject.
    pub fn insert_dual(
        &mut self,
        subject_id: impl Into<String>,
        extractor_id: &str,
        analyzer_id: &str,
    ) -> Result<(), CatalogError> {
        let subject_id = subject_id.into();
        let lookup = |id: &str| {
            self.catalogs
                .get(id)
                .cloned()
                .ok_or_else(|| CatalogError::DanglingReference {
                    subject: subject_id.clone(),
                    catalog: id.to_string(),
                })
        };
        let extractor = lookup(extractor_id)?;
        let analyzer = lookup(analyzer_id)?;

        if let Some(doc) = self
            .documents
            .iter_mut()
            .find(|d| d.subject_id == subject_id)
        {
            doc.has_dual = true;
        }
        self.duals.insert(
            subject_id.clone(),
            DualCatalog {
                subject_id,
                extractor,
                analyzer,
            },
        );
        Ok(())
    }

    /// Add or replace a library entry.
    pub fn insert_document(&mut self, mut info: DocumentInfo) {
        info.has_dual = info.has_dual || self.duals.contains_key(&info.subject_id);
        match self
            .documents
            .iter_mut()
            .find(|d| d.subject_id == info.subject_id)
        {
            Some(existing) => *existing = info,
            None => self.documents.push(info),
        }
    }

    /// Look up a single-timeline catalog.
    pub fn get_catalog(&self, subject_id: &str) -> Result<Arc<Catalog>, CatalogError> {
        self.catalogs
            .get(subject_id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownSubject(subject_id.to_string()))
    }

    /// Look up the dual-timeline pair for a subject.
    pub fn get_dual(&self, subject_id: &str) -> Result<DualCatalog, CatalogError> {
        self.duals
            .get(subject_id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownSubject(subject_id.to_string()))
    }

    pub fn list_documents(&self) -> &[DocumentInfo] {
        &self.documents
    }

    pub fn document(&self, subject_id: &str) -> Option<&DocumentInfo> {
        self.documents.iter().find(|d| d.subject_id == subject_id)
    }

    /// All catalog ids, sorted.
    pub fn catalog_ids(&self) -> Vec<&str> {
        self.catalogs.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        self.catalogs.contains_key(subject_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
