//! # tei-harvest
//!
//! Drive a PDF-to-TEI extraction service (such as GROBID) over a folder of
//! PDFs, keep every response in a per-document artifact tree, and derive
//! keyword clouds, link lists and a figures-per-article chart from them.
//!
//! The batch is idempotent: each artifact carries a small status marker, so
//! a second run makes no requests for work already done and retries only
//! what is missing or failed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input folder
//!  │
//!  ├─ 1. Discover  *.pdf, lexicographic order
//!  ├─ 2. Probe     /api/version + /api/isalive until ready (bounded retries)
//!  ├─ 3. Stages    per document, skipping complete artifacts:
//!  │     ├─ full-text             → pdf_full_text_document/tei.xml
//!  │     ├─ keyword-cloud         → keyword_cloud/{tei.xml, keyword_cloud.png}
//!  │     ├─ links                 → links_in_pdf/{tei.xml, links.txt}
//!  │     └─ figure-visualization  → visualization_figures/visualization_figures.png
//!  └─ 4. Chart     figures_in_articles.png across all documents
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tei_harvest::{run_batch, HarvestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarvestConfig::builder()
//!         .service_url("http://localhost:8070")
//!         .input_folder("./pdfs")
//!         .build()?;
//!     let report = run_batch(&config).await?;
//!     eprintln!(
//!         "{} documents, {} requests, {} failed stages",
//!         report.stats.documents, report.stats.requests, report.stats.stages_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tei-harvest` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! tei-harvest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod batch;
pub mod config;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod retry;
pub mod stream;
pub mod verify;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{ArtifactKind, ArtifactRecord, ArtifactStatus, ArtifactStore};
pub use batch::{run_batch, run_batch_sync, Harvester};
pub use config::{HarvestConfig, HarvestConfigBuilder, Stage, WordCloudOptions, XmlNamespaces};
pub use error::{HarvestError, RenderError, StageError, SubmitError};
pub use health::{HealthProber, ProbeFailure, ProbeOutcome, ServiceInfo};
pub use pipeline::input::{discover_documents, SourceDocument};
pub use pipeline::submit::{DocumentSubmitter, Endpoint, SubmitOutcome};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{BatchReport, BatchStats, DocumentReport, StageOutcome, StageReport, SummaryOutcome};
pub use retry::{poll_until, Backoff, RetryPolicy};
pub use stream::{document_stream, harvest_stream, DocumentStream};
pub use verify::{verify, verify_categories, CategoryResult, CheckCategory, VerificationReport};
