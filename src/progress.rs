//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::HarvestConfigBuilder::progress_callback`] to receive
//! events as the batch moves through the documents. The CLI uses it to drive
//! a terminal progress bar; a service embedding the library could forward
//! the events to a channel instead.
//!
//! # Example
//!
//! ```rust
//! use tei_harvest::{BatchProgressCallback, DocumentReport, HarvestConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, report: &DocumentReport) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} requests)", index + 1, total, report.doc_id, report.requests());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = HarvestConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::Stage;
use crate::report::{DocumentReport, StageOutcome, SummaryOutcome};
use std::sync::Arc;

/// Called by the batch driver as it processes documents.
///
/// Documents are processed one at a time, so calls never overlap, but the
/// trait is `Send + Sync` because the callback lives in the shared config.
/// All methods have default no-op implementations.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before the first document.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before the first stage of a document.
    ///
    /// # Arguments
    /// * `index` — 0-based position in lexicographic order
    fn on_document_start(&self, index: usize, total: usize, doc_id: &str) {
        let _ = (index, total, doc_id);
    }

    /// Called after each stage of a document, whatever its outcome.
    fn on_stage_complete(&self, doc_id: &str, stage: Stage, outcome: &StageOutcome) {
        let _ = (doc_id, stage, outcome);
    }

    /// Called once all stages of a document have run.
    fn on_document_complete(&self, index: usize, total: usize, report: &DocumentReport) {
        let _ = (index, total, report);
    }

    /// Called after the figures chart step (also when it was skipped).
    fn on_summary_complete(&self, outcome: &SummaryOutcome) {
        let _ = outcome;
    }

    /// Called once at the very end.
    ///
    /// # Arguments
    /// * `failed_documents` — documents with at least one failed stage
    fn on_batch_complete(&self, total_documents: usize, failed_documents: usize) {
        let _ = (total_documents, failed_documents);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::HarvestConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
