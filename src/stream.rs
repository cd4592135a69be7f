//! Streaming batch API: emit one [`DocumentReport`] per document as it
//! completes.
//!
//! Unlike the eager [`crate::batch::run_batch`], which returns only after the
//! whole folder is done, [`harvest_stream`] yields reports while the batch
//! runs, so callers can show progress or react to failures early. Documents
//! are processed one at a time in lexicographic order, so reports arrive in
//! that order too.

use crate::batch::Harvester;
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::pipeline::input::{discover_documents, SourceDocument};
use crate::report::DocumentReport;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of document reports.
pub type DocumentStream<'a> = Pin<Box<dyn Stream<Item = DocumentReport> + Send + 'a>>;

/// Stream the documents through `harvester`, borrowing it.
pub fn document_stream(harvester: &Harvester, docs: Vec<SourceDocument>) -> DocumentStream<'_> {
    let total = docs.len();
    let s = stream::iter(docs.into_iter().enumerate())
        .then(move |(index, doc)| async move { process_with_events(harvester, index, total, doc).await });
    Box::pin(s)
}

/// Discover the input folder, wait for the service, then stream the
/// documents. An empty folder yields an empty stream without probing.
///
/// The figures chart is not written; call [`Harvester::write_summary`]
/// after draining the stream if it is wanted.
///
/// # Returns
/// - `Ok(DocumentStream)`: one report per discovered document
/// - `Err(HarvestError)`: input folder unreadable or service not ready
///
/// # Example
/// ```rust,no_run
/// use tei_harvest::{harvest_stream, HarvestConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = HarvestConfig::builder().input_folder("./pdfs").build()?;
/// let mut stream = harvest_stream(&config).await?;
/// while let Some(report) = stream.next().await {
///     println!("{}: {} request(s), failed={}", report.doc_id, report.requests(), report.failed());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn harvest_stream(config: &HarvestConfig) -> Result<DocumentStream<'static>, HarvestError> {
    let harvester = Arc::new(Harvester::new(config.clone())?);
    let docs = discover_documents(&config.input_folder)?;
    if !docs.is_empty() {
        harvester.probe().await?;
    }
    info!("Streaming {} document(s)", docs.len());

    let total = docs.len();
    let s = stream::iter(docs.into_iter().enumerate()).then(move |(index, doc)| {
        let harvester = Arc::clone(&harvester);
        async move { process_with_events(&harvester, index, total, doc).await }
    });
    Ok(Box::pin(s))
}

async fn process_with_events(
    harvester: &Harvester,
    index: usize,
    total: usize,
    doc: SourceDocument,
) -> DocumentReport {
    let cb = harvester.config().progress_callback.as_ref();
    info!("[{}/{}] {}", index + 1, total, doc.id);
    if let Some(cb) = cb {
        cb.on_document_start(index, total, &doc.id);
    }
    let report = harvester.process_document(&doc).await;
    if let Some(cb) = cb {
        cb.on_document_complete(index, total, &report);
    }
    report
}
