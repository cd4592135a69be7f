//! Error types for the tei-harvest library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`HarvestError`] — **Fatal**: the batch cannot proceed at all
//!   (input folder unreadable, service never became ready, invalid config).
//!   Returned as `Err(HarvestError)` from the top-level `run*` functions.
//!
//! * [`SubmitError`] — a single upload to the extraction service failed.
//!   The submitter never retries; the caller maps this into a
//!   [`StageError`] and moves on.
//!
//! * [`StageError`] — **Non-fatal**: one stage of one document failed
//!   (service error, write error, render error). Stored inside
//!   [`crate::report::StageReport`] so a bad document never costs the rest
//!   of the batch. The missing artifact is retried on the next run.
//!
//! [`RenderError`] covers image production (fonts, PNG encoding) and is
//! folded into [`StageError::Render`] for per-document word clouds.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tei-harvest library.
///
/// Per-document failures use [`StageError`] and are stored in
/// [`crate::report::DocumentReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input folder does not exist.
    #[error("Input folder not found: '{path}'\nSet INPUT_FOLDER or pass --input.")]
    InputFolderNotFound { path: PathBuf },

    /// Input folder exists but could not be listed.
    #[error("Failed to read input folder '{path}': {source}")]
    InputFolderUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Service errors ────────────────────────────────────────────────────
    /// The health probe was exhausted without both checks succeeding.
    #[error("Extraction service at '{url}' not ready after {attempts} attempts")]
    ServiceNotReady { url: String, attempts: u32 },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a batch-level output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single upload to the extraction service.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The source document could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection refused, DNS failure, reset, …
    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The per-call timeout elapsed.
    #[error("Request to {endpoint} timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    /// Any status other than 200/204.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
}

/// Failure to produce an image (word cloud or chart).
#[derive(Debug, Error)]
pub enum RenderError {
    /// The configured font file does not exist.
    #[error("Font not found: '{path}'\nFix FONT_PATH / --font, or unset it to use the built-in font.")]
    FontNotFound { path: PathBuf },

    #[error("Failed to read font '{path}': {source}")]
    FontUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid TrueType/OpenType font")]
    FontInvalid { path: PathBuf },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    Task(String),
}

/// A non-fatal error for one stage of one document.
///
/// Stored alongside [`crate::report::StageReport`] when a stage fails.
/// The batch continues with the next stage and the next document.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The extraction service call failed (transport, timeout, bad status).
    #[error("{doc_id}: service call failed: {detail}")]
    Service { doc_id: String, detail: String },

    /// Reading or writing an artifact failed.
    #[error("{doc_id}: storage error at '{path}': {detail}")]
    Storage {
        doc_id: String,
        path: PathBuf,
        detail: String,
    },

    /// Rendering an image failed (e.g. no font available).
    #[error("{doc_id}: render failed: {detail}")]
    Render { doc_id: String, detail: String },
}

impl StageError {
    pub(crate) fn service(doc_id: &str, err: &SubmitError) -> Self {
        StageError::Service {
            doc_id: doc_id.to_string(),
            detail: err.to_string(),
        }
    }

    pub(crate) fn storage(doc_id: &str, path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StageError::Storage {
            doc_id: doc_id.to_string(),
            path: path.into(),
            detail: err.to_string(),
        }
    }
}
