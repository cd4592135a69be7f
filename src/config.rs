//! Configuration types for a harvesting batch.
//!
//! Everything the batch needs is carried by [`HarvestConfig`], built via
//! [`HarvestConfigBuilder`] and passed explicitly to each component. The
//! library never reads environment variables; the CLI maps `SERVICE_URL`,
//! `INPUT_FOLDER` and friends onto the builder.

use crate::error::HarvestError;
use crate::progress::ProgressCallback;
use crate::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL of the extraction service.
pub const DEFAULT_SERVICE_URL: &str = "http://service-host:8070";

/// Default folder scanned for source PDFs.
pub const DEFAULT_INPUT_FOLDER: &str = "/app/pdfs";

/// TEI namespace used by the extraction service's responses.
pub const TEI_NAMESPACE: &str = "http://www.tei-c.org/ns/1.0";

/// Configuration for a harvesting batch.
///
/// # Example
/// ```rust
/// use tei_harvest::{HarvestConfig, Stage};
///
/// let config = HarvestConfig::builder()
///     .service_url("http://localhost:8070")
///     .input_folder("/data/pdfs")
///     .stages(vec![Stage::FullText, Stage::Links])
///     .build()
///     .unwrap();
/// assert_eq!(config.output_root(), std::path::Path::new("/data/pdfs"));
/// ```
#[derive(Clone)]
pub struct HarvestConfig {
    /// Base URL for every service call. Default: `http://service-host:8070`.
    pub service_url: String,

    /// Folder scanned for `*.pdf` files. Default: `/app/pdfs`.
    pub input_folder: PathBuf,

    /// Root of the artifact tree. Default: `None`, meaning the input folder.
    pub output_folder: Option<PathBuf>,

    /// Health-probe attempts before giving up. Default: 10.
    pub probe_attempts: u32,

    /// Fixed sleep between health-probe attempts, in seconds. Default: 10.
    pub probe_interval_secs: u64,

    /// Timeout of a single health-check request, in seconds. Default: 10.
    pub probe_timeout_secs: u64,

    /// Timeout of a single document upload, in seconds. Default: 180.
    ///
    /// Full-text extraction of a long paper can take a minute or more on a
    /// cold service, so this is much larger than the probe timeout.
    pub request_timeout_secs: u64,

    /// When set, `/api/version` must return exactly this string.
    pub expected_version: Option<String>,

    /// Skip the health probe entirely. Default: false.
    pub skip_probe: bool,

    /// Which per-document stages to run. Default: all, in pipeline order.
    pub stages: Vec<Stage>,

    /// Render the cross-document figures chart after the batch. Default: true.
    pub summary: bool,

    /// TrueType font for word clouds and chart labels. Default: search the
    /// usual system font folders.
    pub font_path: Option<PathBuf>,

    /// Which XML namespaces count when matching `abstract` / `figure`.
    pub namespaces: XmlNamespaces,

    /// Word-cloud canvas and density.
    pub word_cloud: WordCloudOptions,

    /// Receives per-document events as the batch progresses.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            input_folder: PathBuf::from(DEFAULT_INPUT_FOLDER),
            output_folder: None,
            probe_attempts: 10,
            probe_interval_secs: 10,
            probe_timeout_secs: 10,
            request_timeout_secs: 180,
            expected_version: None,
            skip_probe: false,
            stages: Stage::ALL.to_vec(),
            summary: true,
            font_path: None,
            namespaces: XmlNamespaces::default(),
            word_cloud: WordCloudOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("service_url", &self.service_url)
            .field("input_folder", &self.input_folder)
            .field("output_folder", &self.output_folder)
            .field("probe_attempts", &self.probe_attempts)
            .field("probe_interval_secs", &self.probe_interval_secs)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("expected_version", &self.expected_version)
            .field("skip_probe", &self.skip_probe)
            .field("stages", &self.stages)
            .field("summary", &self.summary)
            .field("font_path", &self.font_path)
            .field("namespaces", &self.namespaces)
            .field("word_cloud", &self.word_cloud)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl HarvestConfig {
    /// Create a new builder for `HarvestConfig`.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Root of the artifact tree: the output folder if set, else the input folder.
    pub fn output_root(&self) -> &Path {
        self.output_folder.as_deref().unwrap_or(&self.input_folder)
    }

    /// Service URL without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.service_url.trim_end_matches('/')
    }

    /// Retry policy of the readiness probe: fixed interval, bounded attempts.
    pub fn probe_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.probe_attempts,
            backoff: Backoff::Fixed(Duration::from_secs(self.probe_interval_secs)),
        }
    }

    pub fn runs(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Builder for [`HarvestConfig`].
#[derive(Debug)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.config.service_url = url.into();
        self
    }

    pub fn input_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_folder = path.into();
        self
    }

    pub fn output_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_folder = Some(path.into());
        self
    }

    pub fn probe_attempts(mut self, n: u32) -> Self {
        self.config.probe_attempts = n.max(1);
        self
    }

    pub fn probe_interval_secs(mut self, secs: u64) -> Self {
        self.config.probe_interval_secs = secs;
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn expected_version(mut self, version: impl Into<String>) -> Self {
        self.config.expected_version = Some(version.into());
        self
    }

    pub fn skip_probe(mut self, v: bool) -> Self {
        self.config.skip_probe = v;
        self
    }

    /// Select stages. Duplicates are dropped; pipeline order is restored.
    pub fn stages(mut self, stages: Vec<Stage>) -> Self {
        self.config.stages = Stage::ALL
            .iter()
            .copied()
            .filter(|s| stages.contains(s))
            .collect();
        self
    }

    pub fn summary(mut self, v: bool) -> Self {
        self.config.summary = v;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn namespaces(mut self, ns: XmlNamespaces) -> Self {
        self.config.namespaces = ns;
        self
    }

    pub fn word_cloud(mut self, opts: WordCloudOptions) -> Self {
        self.config.word_cloud = opts;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let c = &self.config;
        let url = c.service_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(HarvestError::InvalidConfig(format!(
                "service URL must start with http:// or https://, got '{}'",
                c.service_url
            )));
        }
        if c.stages.is_empty() && !c.summary {
            return Err(HarvestError::InvalidConfig(
                "nothing to do: no stages selected and summary disabled".into(),
            ));
        }
        let wc = &c.word_cloud;
        if wc.width < 100 || wc.height < 100 {
            return Err(HarvestError::InvalidConfig(format!(
                "word cloud must be at least 100x100, got {}x{}",
                wc.width, wc.height
            )));
        }
        if wc.max_words == 0 {
            return Err(HarvestError::InvalidConfig(
                "word cloud max_words must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// A per-document unit of work.
///
/// Each stage owns one network-backed artifact and, for some stages, one
/// artifact derived from it:
///
/// | Stage | Endpoint | Artifacts |
/// |-------|----------|-----------|
/// | `FullText` | `processFulltextDocument` | `pdf_full_text_document/tei.xml` |
/// | `KeywordCloud` | `processHeaderDocument` | `keyword_cloud/{tei.xml, keyword_cloud.png}` |
/// | `Links` | `processReferences` | `links_in_pdf/{tei.xml, links.txt}` |
/// | `FigureVisualization` | `visualization/figures` | `visualization_figures/visualization_figures.png` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    FullText,
    KeywordCloud,
    Links,
    FigureVisualization,
}

impl Stage {
    /// Every stage, in the order the batch runs them.
    pub const ALL: [Stage; 4] = [
        Stage::FullText,
        Stage::KeywordCloud,
        Stage::Links,
        Stage::FigureVisualization,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::FullText => "full-text",
            Stage::KeywordCloud => "keyword-cloud",
            Stage::Links => "links",
            Stage::FigureVisualization => "figure-visualization",
        }
    }

    /// Parse a stage name as printed by [`Stage::name`].
    pub fn parse(s: &str) -> Option<Stage> {
        let s = s.trim().to_lowercase().replace('_', "-");
        Stage::ALL.into_iter().find(|stage| stage.name() == s)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which namespaces an element must belong to for the extractors to match it.
///
/// Schema variants of the service output differ: most responses are in the
/// TEI namespace, some (older versions, BibTeX-to-XML conversions) carry
/// unqualified elements. Both are accepted by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlNamespaces {
    /// Accepted namespace URIs.
    pub uris: Vec<String>,
    /// Also accept elements with no namespace.
    pub allow_unqualified: bool,
}

impl Default for XmlNamespaces {
    fn default() -> Self {
        Self {
            uris: vec![TEI_NAMESPACE.to_string()],
            allow_unqualified: true,
        }
    }
}

impl XmlNamespaces {
    /// Match any namespace at all (local-name matching only).
    pub fn any() -> Self {
        Self {
            uris: Vec::new(),
            allow_unqualified: true,
        }
    }

    /// Match only the given namespace URIs.
    pub fn only<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uris: uris.into_iter().map(Into::into).collect(),
            allow_unqualified: false,
        }
    }

    /// Whether an element in `namespace` (None = unqualified) matches.
    pub fn accepts(&self, namespace: Option<&str>) -> bool {
        match namespace {
            None => self.allow_unqualified,
            // An empty URI list with unqualified allowed means "any".
            Some(_) if self.uris.is_empty() => self.allow_unqualified,
            Some(ns) => self.uris.iter().any(|u| u == ns),
        }
    }
}

/// Canvas and density settings for word clouds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCloudOptions {
    /// Canvas width in pixels. Default: 800.
    pub width: u32,
    /// Canvas height in pixels. Default: 400.
    pub height: u32,
    /// Maximum number of words placed. Default: 200.
    pub max_words: usize,
    /// Smallest font size in pixels; words that no longer fit at this size
    /// are dropped. Default: 10.
    pub min_font_size: f32,
}

impl Default for WordCloudOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
            max_words: 200,
            min_font_size: 10.0,
        }
    }
}
