//! Post-run verification of the artifact tree.
//!
//! The verifier only looks at the disk. For each check category it walks the
//! documents, applies the same completeness rule the batch uses to skip work
//! (see [`crate::artifact::ArtifactRecord::is_complete`]), and collects the
//! paths that fail. A failing check is a reported condition, never an error.

use crate::artifact::{ArtifactKind, ArtifactStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    /// `{root}/{doc_id}/` exists.
    DocumentFolder,
    FullText,
    /// Both the header TEI and the rendered PNG.
    KeywordCloud,
    LinksList,
    FigureVisualization,
    /// Batch-level chart; expected once any document has a complete
    /// full-text TEI.
    FiguresSummary,
}

impl CheckCategory {
    /// Categories checked by [`verify`].
    pub const DEFAULT: [CheckCategory; 5] = [
        CheckCategory::DocumentFolder,
        CheckCategory::FullText,
        CheckCategory::KeywordCloud,
        CheckCategory::LinksList,
        CheckCategory::FiguresSummary,
    ];

    pub const ALL: [CheckCategory; 6] = [
        CheckCategory::DocumentFolder,
        CheckCategory::FullText,
        CheckCategory::KeywordCloud,
        CheckCategory::LinksList,
        CheckCategory::FigureVisualization,
        CheckCategory::FiguresSummary,
    ];

    /// Artifacts that must be complete for one document.
    fn kinds(self) -> &'static [ArtifactKind] {
        match self {
            CheckCategory::DocumentFolder | CheckCategory::FiguresSummary => &[],
            CheckCategory::FullText => &[ArtifactKind::FullText],
            CheckCategory::KeywordCloud => &[ArtifactKind::Header, ArtifactKind::KeywordCloud],
            CheckCategory::LinksList => &[ArtifactKind::LinksList],
            CheckCategory::FigureVisualization => &[ArtifactKind::FigureVisualization],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CheckCategory::DocumentFolder => "document_folder",
            CheckCategory::FullText => "full_text",
            CheckCategory::KeywordCloud => "keyword_cloud",
            CheckCategory::LinksList => "links_list",
            CheckCategory::FigureVisualization => "figure_visualization",
            CheckCategory::FiguresSummary => "figures_summary",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one category over all documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: CheckCategory,
    pub passed: bool,
    /// Paths examined.
    pub checked: usize,
    pub failing: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub documents: usize,
    pub categories: Vec<CategoryResult>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.categories.iter().all(|c| c.passed)
    }

    pub fn category(&self, category: CheckCategory) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn failing_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.categories.iter().flat_map(|c| c.failing.iter())
    }
}

/// Check the default categories (everything but figure visualizations).
pub fn verify<S: AsRef<str>>(store: &ArtifactStore, doc_ids: &[S]) -> VerificationReport {
    verify_categories(store, doc_ids, &CheckCategory::DEFAULT)
}

pub fn verify_categories<S: AsRef<str>>(
    store: &ArtifactStore,
    doc_ids: &[S],
    categories: &[CheckCategory],
) -> VerificationReport {
    let mut report = VerificationReport {
        documents: doc_ids.len(),
        categories: Vec::with_capacity(categories.len()),
    };
    for &category in categories {
        let result = check(store, doc_ids, category);
        if result.passed {
            info!("✓ {} ({} checked)", category, result.checked);
        } else {
            warn!("✗ {}: {} failing", category, result.failing.len());
            for path in &result.failing {
                warn!("  missing or incomplete: {}", path.display());
            }
        }
        report.categories.push(result);
    }
    report
}

fn check<S: AsRef<str>>(store: &ArtifactStore, doc_ids: &[S], category: CheckCategory) -> CategoryResult {
    let mut checked = 0;
    let mut failing = Vec::new();

    match category {
        CheckCategory::DocumentFolder => {
            for id in doc_ids {
                let dir = store.document_dir(id.as_ref());
                checked += 1;
                if !dir.is_dir() {
                    failing.push(dir);
                }
            }
        }
        CheckCategory::FiguresSummary => {
            // Same rule the batch uses to decide what the chart counts.
            let expected = doc_ids.iter().any(|id| {
                store.exists(id.as_ref(), ArtifactKind::FullText)
                    && store.is_complete(id.as_ref(), ArtifactKind::FullText)
            });
            if expected {
                checked += 1;
                let path = store.summary_path();
                if !path.is_file() {
                    failing.push(path);
                }
            }
        }
        _ => {
            for id in doc_ids {
                for &kind in category.kinds() {
                    let record = store.record(id.as_ref(), kind);
                    checked += 1;
                    if !record.is_complete() {
                        failing.push(record.path);
                    }
                }
            }
        }
    }

    CategoryResult {
        category,
        passed: failing.is_empty(),
        checked,
        failing,
    }
}
