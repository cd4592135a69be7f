//! Run reports: what every stage of every document did.
//!
//! Everything here is `Serialize` so the CLI can print it with `--json`.

use crate::config::Stage;
use crate::error::StageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How one stage of one document ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Every artifact of the stage was already complete.
    Skipped,
    /// At least one artifact was produced this run.
    Done,
    /// Processed, nothing found (HTTP 204, no abstract, no words).
    EmptyResult,
    /// The stage failed; its artifacts are retried next run.
    Failed { error: StageError },
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    /// Uploads made to the extraction service by this stage.
    pub requests: usize,
    pub duration_ms: u64,
}

/// Result of processing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub doc_id: String,
    pub path: PathBuf,
    pub stages: Vec<StageReport>,
    pub duration_ms: u64,
}

impl DocumentReport {
    pub fn failed(&self) -> bool {
        self.stages.iter().any(|s| s.outcome.is_failed())
    }

    pub fn errors(&self) -> impl Iterator<Item = &StageError> {
        self.stages.iter().filter_map(|s| match &s.outcome {
            StageOutcome::Failed { error } => Some(error),
            _ => None,
        })
    }

    pub fn requests(&self) -> usize {
        self.stages.iter().map(|s| s.requests).sum()
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Whether this run wrote a new full-text TEI for the document.
    pub fn produced_full_text(&self) -> bool {
        self.stage(Stage::FullText)
            .is_some_and(|s| s.outcome == StageOutcome::Done)
    }
}

/// What happened to `figures_in_articles.png`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SummaryOutcome {
    /// Summary disabled in the configuration.
    Disabled,
    /// Chart present and no new full-text artifacts this run.
    UpToDate,
    /// No document has a full-text artifact to count figures in.
    NoData,
    Written { path: PathBuf, documents: usize },
    Failed { detail: String },
}

/// Totals over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub documents: usize,
    pub documents_failed: usize,
    pub stages_done: usize,
    pub stages_skipped: usize,
    pub stages_empty: usize,
    pub stages_failed: usize,
    /// Uploads made to the extraction service.
    pub requests: usize,
    pub duration_ms: u64,
}

impl BatchStats {
    pub fn from_documents(documents: &[DocumentReport], duration_ms: u64) -> Self {
        let mut stats = BatchStats {
            documents: documents.len(),
            duration_ms,
            ..Default::default()
        };
        for doc in documents {
            if doc.failed() {
                stats.documents_failed += 1;
            }
            stats.requests += doc.requests();
            for s in &doc.stages {
                match s.outcome {
                    StageOutcome::Skipped => stats.stages_skipped += 1,
                    StageOutcome::Done => stats.stages_done += 1,
                    StageOutcome::EmptyResult => stats.stages_empty += 1,
                    StageOutcome::Failed { .. } => stats.stages_failed += 1,
                }
            }
        }
        stats
    }
}

/// Result of a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Reported by `/api/version`; `None` when the probe was skipped.
    pub service_version: Option<String>,
    pub input_folder: PathBuf,
    pub output_root: PathBuf,
    pub documents: Vec<DocumentReport>,
    pub summary: SummaryOutcome,
    pub stats: BatchStats,
}

impl BatchReport {
    /// Any stage of any document failed, or the summary chart could not be
    /// written.
    pub fn has_failures(&self) -> bool {
        self.stats.stages_failed > 0 || matches!(self.summary, SummaryOutcome::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(stage: Stage, outcome: StageOutcome, requests: usize) -> StageReport {
        StageReport {
            stage,
            outcome,
            requests,
            duration_ms: 1,
        }
    }

    fn doc(id: &str, stages: Vec<StageReport>) -> DocumentReport {
        DocumentReport {
            doc_id: id.into(),
            path: PathBuf::from(format!("/in/{id}.pdf")),
            stages,
            duration_ms: 3,
        }
    }

    fn failure() -> StageOutcome {
        StageOutcome::Failed {
            error: StageError::Service {
                doc_id: "b".into(),
                detail: "HTTP 503".into(),
            },
        }
    }

    #[test]
    fn stats_count_outcomes_and_requests() {
        let docs = vec![
            doc(
                "a",
                vec![
                    stage(Stage::FullText, StageOutcome::Done, 1),
                    stage(Stage::Links, StageOutcome::EmptyResult, 1),
                ],
            ),
            doc(
                "b",
                vec![
                    stage(Stage::FullText, StageOutcome::Skipped, 0),
                    stage(Stage::Links, failure(), 1),
                ],
            ),
        ];
        let stats = BatchStats::from_documents(&docs, 42);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.documents_failed, 1);
        assert_eq!(stats.stages_done, 1);
        assert_eq!(stats.stages_empty, 1);
        assert_eq!(stats.stages_skipped, 1);
        assert_eq!(stats.stages_failed, 1);
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.duration_ms, 42);

        assert!(docs[0].produced_full_text());
        assert!(!docs[1].produced_full_text());
        assert_eq!(docs[1].errors().count(), 1);
    }

    #[test]
    fn stage_report_serialises_flat() {
        let json = serde_json::to_value(stage(Stage::KeywordCloud, StageOutcome::EmptyResult, 1)).unwrap();
        assert_eq!(json["stage"], "keyword-cloud");
        assert_eq!(json["outcome"], "empty_result");
        assert_eq!(json["requests"], 1);

        let json = serde_json::to_value(stage(Stage::Links, failure(), 1)).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert!(json["error"]["Service"]["detail"].as_str().unwrap().contains("503"));
    }

    #[test]
    fn failed_summary_fails_the_batch() {
        let report = BatchReport {
            service_version: None,
            input_folder: "/in".into(),
            output_root: "/in".into(),
            documents: vec![],
            summary: SummaryOutcome::Failed {
                detail: "disk full".into(),
            },
            stats: BatchStats::default(),
        };
        assert!(report.has_failures());
    }
}
