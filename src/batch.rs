//! Batch driver: discover, probe, run every stage for every document, then
//! regenerate the figures chart.
//!
//! Each stage consults the [`ArtifactStore`] first and only talks to the
//! extraction service for artifacts that are not complete. A stage that
//! fails records a `Failed` marker and the batch moves on; re-running the
//! batch later fills in exactly the missing pieces.
//!
//! ```text
//! discover ──▶ probe (only if any PDF) ──▶ for each document (sorted):
//!                          full-text ─▶ keyword-cloud ─▶ links ─▶ figure-visualization
//!                        ──▶ figures chart
//! ```

use crate::artifact::{ArtifactKind, ArtifactStatus, ArtifactStore, NO_LINKS_SENTINEL, NO_REFERENCES_SENTINEL};
use crate::config::{HarvestConfig, Stage};
use crate::error::{HarvestError, StageError};
use crate::health::HealthProber;
use crate::pipeline::chart::FigureCount;
use crate::pipeline::extract::{count_figures_in_file, extract_abstract, extract_links};
use crate::pipeline::input::{discover_documents, SourceDocument};
use crate::pipeline::render::{render_figures_summary_png, render_keyword_cloud_png};
use crate::pipeline::submit::{DocumentSubmitter, Endpoint, SubmitOutcome};
use crate::report::{BatchReport, BatchStats, DocumentReport, StageOutcome, StageReport, SummaryOutcome};
use crate::stream::document_stream;
use futures::StreamExt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run a whole batch as configured.
///
/// # Errors
/// Returns `Err(HarvestError)` only for fatal errors:
/// - input folder missing or unreadable
/// - the service never became ready
/// - the figures chart could not be written
///
/// Per-document failures are reported in the returned [`BatchReport`]
/// (check [`BatchReport::has_failures`]).
pub async fn run_batch(config: &HarvestConfig) -> Result<BatchReport, HarvestError> {
    Harvester::new(config.clone())?.run().await
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a new Tokio runtime internally, so it must not be called from
/// inside an existing runtime.
pub fn run_batch_sync(config: &HarvestConfig) -> Result<BatchReport, HarvestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HarvestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(config))
}

/// Owns everything a batch needs: configuration, artifact store and HTTP
/// client.
#[derive(Debug)]
pub struct Harvester {
    config: HarvestConfig,
    store: ArtifactStore,
    submitter: DocumentSubmitter,
}

impl Harvester {
    pub fn new(config: HarvestConfig) -> Result<Self, HarvestError> {
        let store = ArtifactStore::new(config.output_root());
        let submitter = DocumentSubmitter::new(config.base_url(), config.request_timeout_secs)?;
        Ok(Self {
            config,
            store,
            submitter,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Wait for the service unless the probe is disabled.
    ///
    /// # Returns
    /// The reported service version, or `None` when probing was skipped.
    pub async fn probe(&self) -> Result<Option<String>, HarvestError> {
        if self.config.skip_probe {
            info!("Health probe disabled; assuming the service is up");
            return Ok(None);
        }
        let prober = HealthProber::from_config(&self.config)?;
        match prober.wait().await {
            Some(info) => Ok(Some(info.version)),
            None => Err(HarvestError::ServiceNotReady {
                url: self.config.base_url().to_string(),
                attempts: prober.policy().max_attempts.max(1),
            }),
        }
    }

    pub async fn run(&self) -> Result<BatchReport, HarvestError> {
        let start = Instant::now();
        let docs = discover_documents(&self.config.input_folder)?;
        let service_version = if docs.is_empty() {
            info!("No PDF files in {}; service not probed", self.config.input_folder.display());
            None
        } else {
            self.probe().await?
        };

        let total = docs.len();
        if let Some(cb) = &self.config.progress_callback {
            cb.on_batch_start(total);
        }
        info!(
            "Processing {} document(s) into {} (stages: {})",
            total,
            self.store.root().display(),
            self.config
                .stages
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let documents: Vec<DocumentReport> = document_stream(self, docs.clone()).collect().await;

        let summary = self.write_summary(&docs, &documents).await?;
        if let Some(cb) = &self.config.progress_callback {
            cb.on_summary_complete(&summary);
        }

        let stats = BatchStats::from_documents(&documents, start.elapsed().as_millis() as u64);
        info!(
            "Batch complete: {} document(s), {} stage(s) done, {} skipped, {} empty, {} failed, {} request(s), {}ms",
            stats.documents,
            stats.stages_done,
            stats.stages_skipped,
            stats.stages_empty,
            stats.stages_failed,
            stats.requests,
            stats.duration_ms
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_batch_complete(total, stats.documents_failed);
        }

        Ok(BatchReport {
            service_version,
            input_folder: self.config.input_folder.clone(),
            output_root: self.store.root().to_path_buf(),
            documents,
            summary,
            stats,
        })
    }

    /// Run every configured stage for one document, in pipeline order.
    /// Never fails: stage errors are recorded in the report.
    pub async fn process_document(&self, doc: &SourceDocument) -> DocumentReport {
        let start = Instant::now();
        let mut stages = Vec::with_capacity(self.config.stages.len());

        for stage in Stage::ALL.into_iter().filter(|&s| self.config.runs(s)) {
            let stage_start = Instant::now();
            let mut requests = 0;
            let result = match stage {
                Stage::FullText => self.full_text(doc, &mut requests).await,
                Stage::KeywordCloud => self.keyword_cloud(doc, &mut requests).await,
                Stage::Links => self.links(doc, &mut requests).await,
                Stage::FigureVisualization => self.figure_visualization(doc, &mut requests).await,
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!("{}", error);
                    StageOutcome::Failed { error }
                }
            };
            debug!("{}/{}: {:?} ({} request(s))", doc.id, stage, outcome, requests);
            if let Some(cb) = &self.config.progress_callback {
                cb.on_stage_complete(&doc.id, stage, &outcome);
            }
            stages.push(StageReport {
                stage,
                outcome,
                requests,
                duration_ms: stage_start.elapsed().as_millis() as u64,
            });
        }

        DocumentReport {
            doc_id: doc.id.clone(),
            path: doc.path.clone(),
            stages,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    // ── Stages ────────────────────────────────────────────────────────────

    async fn full_text(&self, doc: &SourceDocument, requests: &mut usize) -> Result<StageOutcome, StageError> {
        if self.store.is_complete(&doc.id, ArtifactKind::FullText) {
            return Ok(StageOutcome::Skipped);
        }
        Ok(match self.fetch(doc, Endpoint::FullText, ArtifactKind::FullText, requests).await? {
            SubmitOutcome::Payload(_) => StageOutcome::Done,
            SubmitOutcome::Empty => StageOutcome::EmptyResult,
        })
    }

    /// Header TEI, then a word cloud of its abstract.
    async fn keyword_cloud(&self, doc: &SourceDocument, requests: &mut usize) -> Result<StageOutcome, StageError> {
        let id = doc.id.as_str();
        let header_done = self.store.is_complete(id, ArtifactKind::Header);
        let cloud_done = self.store.is_complete(id, ArtifactKind::KeywordCloud);
        if header_done && cloud_done {
            return Ok(StageOutcome::Skipped);
        }

        let header = if header_done {
            self.stored_payload(id, ArtifactKind::Header)?
        } else {
            match self.fetch(doc, Endpoint::Header, ArtifactKind::Header, requests).await? {
                SubmitOutcome::Payload(bytes) => Some(bytes),
                SubmitOutcome::Empty => None,
            }
        };
        if cloud_done {
            return Ok(StageOutcome::Done);
        }

        let Some(header) = header else {
            self.mark_empty(id, ArtifactKind::KeywordCloud, "header endpoint returned no content")?;
            return Ok(StageOutcome::EmptyResult);
        };
        let Some(abstract_text) = extract_abstract(&String::from_utf8_lossy(&header), &self.config.namespaces)
        else {
            info!("{}: no abstract, keyword cloud skipped", id);
            self.mark_empty(id, ArtifactKind::KeywordCloud, "no abstract in header")?;
            return Ok(StageOutcome::EmptyResult);
        };

        let kind = ArtifactKind::KeywordCloud;
        self.store
            .discard_incomplete(id, kind)
            .map_err(|e| self.storage_error(id, kind, e))?;
        self.store
            .mark(id, kind, ArtifactStatus::Pending, None)
            .map_err(|e| self.storage_error(id, kind, e))?;

        let rendered = render_keyword_cloud_png(
            abstract_text,
            self.config.word_cloud.clone(),
            self.config.font_path.clone(),
        )
        .await;
        match rendered {
            Ok(Some(png)) => {
                self.store
                    .write_new(id, kind, &png)
                    .map_err(|e| self.storage_error(id, kind, e))?;
                info!("{}: keyword cloud written ({} bytes)", id, png.len());
                Ok(StageOutcome::Done)
            }
            Ok(None) => {
                self.mark_empty(id, kind, "abstract has no drawable words")?;
                Ok(StageOutcome::EmptyResult)
            }
            Err(e) => {
                self.mark_failed(id, kind, &e.to_string());
                Err(StageError::Render {
                    doc_id: id.to_string(),
                    detail: e.to_string(),
                })
            }
        }
    }

    /// References TEI, then the sorted list of http links in it.
    async fn links(&self, doc: &SourceDocument, requests: &mut usize) -> Result<StageOutcome, StageError> {
        let id = doc.id.as_str();
        let kind = ArtifactKind::LinksList;
        if self.store.is_complete(id, kind) {
            return Ok(StageOutcome::Skipped);
        }

        let references = if self.store.is_complete(id, ArtifactKind::References) {
            self.stored_payload(id, ArtifactKind::References)?
        } else {
            match self
                .fetch(doc, Endpoint::References, ArtifactKind::References, requests)
                .await?
            {
                SubmitOutcome::Payload(bytes) => Some(bytes),
                SubmitOutcome::Empty => None,
            }
        };

        self.store
            .discard_incomplete(id, kind)
            .map_err(|e| self.storage_error(id, kind, e))?;

        let Some(references) = references else {
            info!("{}: no reference analysis (HTTP 204)", id);
            self.store
                .write_sentinel(id, kind, NO_REFERENCES_SENTINEL)
                .map_err(|e| self.storage_error(id, kind, e))?;
            return Ok(StageOutcome::EmptyResult);
        };

        let links = extract_links(&String::from_utf8_lossy(&references));
        if links.is_empty() {
            info!("{}: no links in references", id);
            self.store
                .write_sentinel(id, kind, NO_LINKS_SENTINEL)
                .map_err(|e| self.storage_error(id, kind, e))?;
            return Ok(StageOutcome::EmptyResult);
        }

        let mut body = links.join("\n");
        body.push('\n');
        self.store
            .write_new(id, kind, body.as_bytes())
            .map_err(|e| self.storage_error(id, kind, e))?;
        info!("{}: {} link(s) written", id, links.len());
        Ok(StageOutcome::Done)
    }

    async fn figure_visualization(
        &self,
        doc: &SourceDocument,
        requests: &mut usize,
    ) -> Result<StageOutcome, StageError> {
        let kind = ArtifactKind::FigureVisualization;
        if self.store.is_complete(&doc.id, kind) {
            return Ok(StageOutcome::Skipped);
        }
        Ok(match self.fetch(doc, Endpoint::FigureVisualization, kind, requests).await? {
            SubmitOutcome::Payload(_) => StageOutcome::Done,
            SubmitOutcome::Empty => StageOutcome::EmptyResult,
        })
    }

    // ── Summary ───────────────────────────────────────────────────────────

    /// Regenerate `figures_in_articles.png` if it is missing or this run
    /// produced a new full-text TEI.
    ///
    /// Only documents of the current batch with a complete full-text TEI
    /// are counted.
    pub async fn write_summary(
        &self,
        docs: &[SourceDocument],
        reports: &[DocumentReport],
    ) -> Result<SummaryOutcome, HarvestError> {
        if !self.config.summary {
            return Ok(SummaryOutcome::Disabled);
        }

        let counts: Vec<FigureCount> = docs
            .iter()
            .filter(|d| {
                self.store.exists(&d.id, ArtifactKind::FullText)
                    && self.store.is_complete(&d.id, ArtifactKind::FullText)
            })
            .map(|d| {
                let path = self.store.artifact_path(&d.id, ArtifactKind::FullText);
                FigureCount::new(d.id.clone(), count_figures_in_file(&path, &self.config.namespaces))
            })
            .collect();
        if counts.is_empty() {
            info!("No full-text TEI available; figures chart skipped");
            return Ok(SummaryOutcome::NoData);
        }

        let inputs_changed = reports.iter().any(DocumentReport::produced_full_text);
        if self.store.summary_path().is_file() && !inputs_changed {
            info!("Figures chart up to date");
            return Ok(SummaryOutcome::UpToDate);
        }

        let documents = counts.len();
        let png = match render_figures_summary_png(counts, self.config.font_path.clone()).await {
            Ok(Some(png)) => png,
            Ok(None) => return Ok(SummaryOutcome::NoData),
            Err(e) => {
                warn!("Figures chart failed: {}", e);
                return Ok(SummaryOutcome::Failed { detail: e.to_string() });
            }
        };
        let path = self
            .store
            .replace_summary(&png)
            .map_err(|source| HarvestError::OutputWriteFailed {
                path: self.store.summary_path(),
                source,
            })?;
        info!("Figures chart written to {} ({} document(s))", path.display(), documents);
        Ok(SummaryOutcome::Written { path, documents })
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    /// Upload `doc` to `endpoint` and persist the answer as `kind`.
    ///
    /// Marks `Pending` before the call, then `Done` (payload written),
    /// `EmptyResult` (HTTP 204) or `Failed`.
    async fn fetch(
        &self,
        doc: &SourceDocument,
        endpoint: Endpoint,
        kind: ArtifactKind,
        requests: &mut usize,
    ) -> Result<SubmitOutcome, StageError> {
        debug_assert_eq!(kind.endpoint(), Some(endpoint));
        let id = doc.id.as_str();
        self.store
            .discard_incomplete(id, kind)
            .map_err(|e| self.storage_error(id, kind, e))?;
        self.store
            .mark(id, kind, ArtifactStatus::Pending, None)
            .map_err(|e| self.storage_error(id, kind, e))?;

        *requests += 1;
        match self.submitter.submit(&doc.path, endpoint).await {
            Ok(SubmitOutcome::Payload(bytes)) => {
                if let Err(e) = self.store.write_new(id, kind, &bytes) {
                    self.mark_failed(id, kind, &e.to_string());
                    return Err(self.storage_error(id, kind, e));
                }
                Ok(SubmitOutcome::Payload(bytes))
            }
            Ok(SubmitOutcome::Empty) => {
                self.mark_empty(id, kind, "HTTP 204 (no content)")?;
                Ok(SubmitOutcome::Empty)
            }
            Err(e) => {
                self.mark_failed(id, kind, &e.to_string());
                Err(StageError::service(id, &e))
            }
        }
    }

    /// Contents of a complete network artifact; `None` when it was recorded
    /// as an empty result.
    fn stored_payload(&self, id: &str, kind: ArtifactKind) -> Result<Option<Vec<u8>>, StageError> {
        if self.store.status(id, kind) == Some(ArtifactStatus::EmptyResult) {
            return Ok(None);
        }
        debug!("{}/{}: reusing stored artifact", id, kind);
        self.store
            .read(id, kind)
            .map(Some)
            .map_err(|e| self.storage_error(id, kind, e))
    }

    fn mark_empty(&self, id: &str, kind: ArtifactKind, detail: &str) -> Result<(), StageError> {
        self.store
            .mark(id, kind, ArtifactStatus::EmptyResult, Some(detail))
            .map_err(|e| self.storage_error(id, kind, e))
    }

    /// Best effort: the stage already failed, a marker error is only logged.
    fn mark_failed(&self, id: &str, kind: ArtifactKind, detail: &str) {
        if let Err(e) = self.store.mark(id, kind, ArtifactStatus::Failed, Some(detail)) {
            warn!("{}/{}: could not record failure: {}", id, kind, e);
        }
    }

    fn storage_error(&self, id: &str, kind: ArtifactKind, err: std::io::Error) -> StageError {
        StageError::storage(id, self.store.artifact_path(id, kind), err)
    }
}
