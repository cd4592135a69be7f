//! Document upload: one multipart POST per (document, endpoint).
//!
//! The submitter is intentionally dumb: it reads the PDF, uploads it under
//! the `input` form field, and classifies the answer. It never retries. A
//! failed upload leaves the artifact missing and the next run of the batch
//! tries again, which keeps the retry policy in one place (the artifact
//! store's completion markers).

use crate::error::{HarvestError, SubmitError};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Longest service error body kept in a [`SubmitError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Fixed paths of the extraction service's HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Version,
    IsAlive,
    FullText,
    Header,
    References,
    FigureVisualization,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Version => "/api/version",
            Endpoint::IsAlive => "/api/isalive",
            Endpoint::FullText => "/api/processFulltextDocument",
            Endpoint::Header => "/api/processHeaderDocument",
            Endpoint::References => "/api/processReferences",
            Endpoint::FigureVisualization => "/api/visualization/figures",
        }
    }

    pub fn url(self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Successful answer of an extraction endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// HTTP 200 with the raw body.
    Payload(Vec<u8>),
    /// HTTP 204: the service processed the file and found nothing. Only the
    /// references endpoint uses this in practice.
    Empty,
}

/// Uploads documents to the extraction service.
#[derive(Debug, Clone)]
pub struct DocumentSubmitter {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl DocumentSubmitter {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| HarvestError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout_secs,
        })
    }

    /// Upload `doc_path` to `endpoint` once.
    pub async fn submit(&self, doc_path: &Path, endpoint: Endpoint) -> Result<SubmitOutcome, SubmitError> {
        let data = tokio::fs::read(doc_path)
            .await
            .map_err(|source| SubmitError::ReadDocument {
                path: doc_path.to_path_buf(),
                source,
            })?;
        let file_name = doc_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        debug!("POST {} ({} bytes, {})", endpoint, data.len(), file_name);

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| self.transport_error(endpoint, &e))?;
        let form = reqwest::multipart::Form::new().part("input", part);

        let response = self
            .client
            .post(endpoint.url(&self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, &e))?;

        let status = response.status().as_u16();
        match status {
            200 => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| self.transport_error(endpoint, &e))?;
                info!("{} → 200 ({} bytes)", endpoint, body.len());
                Ok(SubmitOutcome::Payload(body.to_vec()))
            }
            204 => {
                info!("{} → 204 (no content)", endpoint);
                Ok(SubmitOutcome::Empty)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SubmitError::Status {
                    endpoint: endpoint.path().to_string(),
                    status,
                    body: truncate_body(&body),
                })
            }
        }
    }

    fn transport_error(&self, endpoint: Endpoint, e: &reqwest::Error) -> SubmitError {
        if e.is_timeout() {
            SubmitError::Timeout {
                endpoint: endpoint.path().to_string(),
                secs: self.timeout_secs,
            }
        } else {
            SubmitError::Transport {
                endpoint: endpoint.path().to_string(),
                message: e.to_string(),
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}\u{2026}")
    } else {
        body.to_string()
    }
}
