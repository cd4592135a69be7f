//! On-disk artifact tree and completion markers.
//!
//! Every artifact lives at a deterministic path:
//!
//! ```text
//! {root}/
//!  ├─ figures_in_articles.png                 (batch level)
//!  └─ {doc_id}/
//!      ├─ pdf_full_text_document/tei.xml
//!      ├─ keyword_cloud/{tei.xml, keyword_cloud.png}
//!      ├─ links_in_pdf/{tei.xml, links.txt}
//!      └─ visualization_figures/visualization_figures.png
//! ```
//!
//! Next to each artifact the store keeps a small JSON sidecar,
//! `<file>.status.json`, recording an [`ArtifactStatus`]. File presence alone
//! cannot tell "processed, found nothing" from "never attempted", and a
//! `Pending` marker left by a crashed run must not be mistaken for success.
//! Trees written before markers existed are still honoured: a present file
//! with no marker counts as done.
//!
//! Artifacts are written through a temp file in the target folder and
//! persisted without clobbering, so a reader never sees a half-written file
//! and an existing artifact is never overwritten. The batch-level summary
//! chart is the one exception (see [`ArtifactStore::replace_summary`]).

use crate::pipeline::submit::Endpoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Written to `links.txt` when the references endpoint answers HTTP 204.
pub const NO_REFERENCES_SENTINEL: &str =
    "No reference analysis was produced for this file: processReferences returned HTTP 204 (no content).";

/// Written to `links.txt` when the references markup contains no http links.
pub const NO_LINKS_SENTINEL: &str = "No links were found in the references of this file.";

const MARKER_SUFFIX: &str = ".status.json";

/// Fixed category of an artifact, determining its endpoint and path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    FullText,
    Header,
    References,
    FigureVisualization,
    KeywordCloud,
    LinksList,
    FiguresSummary,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::FullText,
        ArtifactKind::Header,
        ArtifactKind::References,
        ArtifactKind::FigureVisualization,
        ArtifactKind::KeywordCloud,
        ArtifactKind::LinksList,
        ArtifactKind::FiguresSummary,
    ];

    /// Folder under `{root}/{doc_id}/`, or `None` for batch-level artifacts.
    pub fn subfolder(self) -> Option<&'static str> {
        match self {
            ArtifactKind::FullText => Some("pdf_full_text_document"),
            ArtifactKind::Header | ArtifactKind::KeywordCloud => Some("keyword_cloud"),
            ArtifactKind::References | ArtifactKind::LinksList => Some("links_in_pdf"),
            ArtifactKind::FigureVisualization => Some("visualization_figures"),
            ArtifactKind::FiguresSummary => None,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::FullText | ArtifactKind::Header | ArtifactKind::References => "tei.xml",
            ArtifactKind::KeywordCloud => "keyword_cloud.png",
            ArtifactKind::LinksList => "links.txt",
            ArtifactKind::FigureVisualization => "visualization_figures.png",
            ArtifactKind::FiguresSummary => "figures_in_articles.png",
        }
    }

    /// The extraction endpoint that produces this artifact directly, if any.
    pub fn endpoint(self) -> Option<Endpoint> {
        match self {
            ArtifactKind::FullText => Some(Endpoint::FullText),
            ArtifactKind::Header => Some(Endpoint::Header),
            ArtifactKind::References => Some(Endpoint::References),
            ArtifactKind::FigureVisualization => Some(Endpoint::FigureVisualization),
            ArtifactKind::KeywordCloud | ArtifactKind::LinksList | ArtifactKind::FiguresSummary => None,
        }
    }

    pub fn is_batch_level(self) -> bool {
        self.subfolder().is_none()
    }

    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::FullText => "full_text",
            ArtifactKind::Header => "header",
            ArtifactKind::References => "references",
            ArtifactKind::FigureVisualization => "figure_visualization",
            ArtifactKind::KeywordCloud => "keyword_cloud",
            ArtifactKind::LinksList => "links_list",
            ArtifactKind::FiguresSummary => "figures_summary",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of one (document, kind) artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Work started but never finished (crash, kill). Retried next run.
    Pending,
    /// Artifact written.
    Done,
    /// Processed successfully and found nothing. Never retried.
    EmptyResult,
    /// Attempted and failed. Retried next run.
    Failed,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusMarker {
    kind: ArtifactKind,
    status: ArtifactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Snapshot of one artifact's state on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    pub doc_id: String,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub present: bool,
    /// `None` when no sidecar marker exists.
    pub status: Option<ArtifactStatus>,
}

impl ArtifactRecord {
    /// Whether later runs may skip the work that produces this artifact.
    pub fn is_complete(&self) -> bool {
        match self.status {
            None => self.present,
            Some(ArtifactStatus::Done) => self.present,
            Some(ArtifactStatus::EmptyResult) => true,
            Some(ArtifactStatus::Pending) | Some(ArtifactStatus::Failed) => false,
        }
    }
}

/// Maps (document id, kind) to paths under a root folder.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_dir(&self, doc_id: &str) -> PathBuf {
        self.root.join(doc_id)
    }

    /// Deterministic location of an artifact. `doc_id` is ignored for
    /// batch-level kinds.
    pub fn artifact_path(&self, doc_id: &str, kind: ArtifactKind) -> PathBuf {
        match kind.subfolder() {
            Some(sub) => self.root.join(doc_id).join(sub).join(kind.file_name()),
            None => self.root.join(kind.file_name()),
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.artifact_path("", ArtifactKind::FiguresSummary)
    }

    fn marker_path(&self, doc_id: &str, kind: ArtifactKind) -> PathBuf {
        let mut p = self.artifact_path(doc_id, kind).into_os_string();
        p.push(MARKER_SUFFIX);
        PathBuf::from(p)
    }

    pub fn exists(&self, doc_id: &str, kind: ArtifactKind) -> bool {
        self.artifact_path(doc_id, kind).is_file()
    }

    /// Create the artifact's parent folder if missing; returns it.
    pub fn ensure_dir(&self, doc_id: &str, kind: ArtifactKind) -> io::Result<PathBuf> {
        let path = self.artifact_path(doc_id, kind);
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Status recorded in the sidecar, if any. A corrupt sidecar reads as
    /// `Pending` so the work is redone rather than trusted.
    pub fn status(&self, doc_id: &str, kind: ArtifactKind) -> Option<ArtifactStatus> {
        let marker = self.marker_path(doc_id, kind);
        let raw = match std::fs::read(&marker) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Unreadable status marker {}: {}", marker.display(), e);
                return Some(ArtifactStatus::Pending);
            }
        };
        match serde_json::from_slice::<StatusMarker>(&raw) {
            Ok(m) => Some(m.status),
            Err(e) => {
                warn!("Corrupt status marker {}: {}", marker.display(), e);
                Some(ArtifactStatus::Pending)
            }
        }
    }

    pub fn record(&self, doc_id: &str, kind: ArtifactKind) -> ArtifactRecord {
        let path = self.artifact_path(doc_id, kind);
        ArtifactRecord {
            doc_id: doc_id.to_string(),
            kind,
            present: path.is_file(),
            status: self.status(doc_id, kind),
            path,
        }
    }

    pub fn is_complete(&self, doc_id: &str, kind: ArtifactKind) -> bool {
        self.record(doc_id, kind).is_complete()
    }

    /// Remove a leftover file whose marker says it was never finished, so a
    /// retry can write it again. Complete artifacts are left alone.
    /// Returns whether a file was removed.
    pub fn discard_incomplete(&self, doc_id: &str, kind: ArtifactKind) -> io::Result<bool> {
        let rec = self.record(doc_id, kind);
        if !rec.present || rec.is_complete() {
            return Ok(false);
        }
        warn!("{}/{}: discarding unfinished {}", doc_id, kind, rec.path.display());
        std::fs::remove_file(&rec.path)?;
        Ok(true)
    }

    /// Record a status in the artifact's sidecar (replacing any previous one).
    pub fn mark(
        &self,
        doc_id: &str,
        kind: ArtifactKind,
        status: ArtifactStatus,
        detail: Option<&str>,
    ) -> io::Result<()> {
        let dir = self.ensure_dir(doc_id, kind)?;
        let marker = StatusMarker {
            kind,
            status,
            detail: detail.map(str::to_string),
        };
        let json = serde_json::to_vec_pretty(&marker).map_err(io::Error::other)?;
        write_atomic(&dir, &self.marker_path(doc_id, kind), &json, true)?;
        debug!("{}/{}: marked {:?}", doc_id, kind, status);
        Ok(())
    }

    /// Write a new artifact and mark it `Done`.
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] if the file is already
    /// there; callers check [`ArtifactStore::is_complete`] first.
    pub fn write_new(&self, doc_id: &str, kind: ArtifactKind, bytes: &[u8]) -> io::Result<PathBuf> {
        self.write_with_status(doc_id, kind, bytes, ArtifactStatus::Done)
    }

    /// Write a sentinel artifact ("processed, found nothing") and mark it
    /// `EmptyResult`.
    pub fn write_sentinel(&self, doc_id: &str, kind: ArtifactKind, text: &str) -> io::Result<PathBuf> {
        self.write_with_status(doc_id, kind, text.as_bytes(), ArtifactStatus::EmptyResult)
    }

    fn write_with_status(
        &self,
        doc_id: &str,
        kind: ArtifactKind,
        bytes: &[u8],
        status: ArtifactStatus,
    ) -> io::Result<PathBuf> {
        let dir = self.ensure_dir(doc_id, kind)?;
        let path = self.artifact_path(doc_id, kind);
        write_atomic(&dir, &path, bytes, false)?;
        self.mark(doc_id, kind, status, None)?;
        debug!("{}/{}: wrote {} bytes to {}", doc_id, kind, bytes.len(), path.display());
        Ok(path)
    }

    pub fn read(&self, doc_id: &str, kind: ArtifactKind) -> io::Result<Vec<u8>> {
        std::fs::read(self.artifact_path(doc_id, kind))
    }

    /// Write the batch-level summary chart, replacing any previous one.
    ///
    /// The chart aggregates every document, so it is regenerated whenever
    /// its inputs change rather than written once.
    pub fn replace_summary(&self, bytes: &[u8]) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.summary_path();
        write_atomic(&self.root, &path, bytes, true)?;
        Ok(path)
    }
}

/// Temp file in `dir`, then rename onto `path`.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8], clobber: bool) -> io::Result<()> {
    let mut tmp = tempfile::Builder::new().prefix(".partial-").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    if clobber {
        tmp.persist(path).map_err(|e| e.error)?;
    } else {
        tmp.persist_noclobber(path).map_err(|e| e.error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn layout_is_deterministic() {
        let s = ArtifactStore::new("/out");
        assert_eq!(
            s.artifact_path("paper", ArtifactKind::FullText),
            PathBuf::from("/out/paper/pdf_full_text_document/tei.xml")
        );
        assert_eq!(
            s.artifact_path("paper", ArtifactKind::Header),
            PathBuf::from("/out/paper/keyword_cloud/tei.xml")
        );
        assert_eq!(
            s.artifact_path("paper", ArtifactKind::KeywordCloud),
            PathBuf::from("/out/paper/keyword_cloud/keyword_cloud.png")
        );
        assert_eq!(
            s.artifact_path("paper", ArtifactKind::References),
            PathBuf::from("/out/paper/links_in_pdf/tei.xml")
        );
        assert_eq!(
            s.artifact_path("paper", ArtifactKind::LinksList),
            PathBuf::from("/out/paper/links_in_pdf/links.txt")
        );
        assert_eq!(
            s.artifact_path("paper", ArtifactKind::FigureVisualization),
            PathBuf::from("/out/paper/visualization_figures/visualization_figures.png")
        );
        assert_eq!(
            s.artifact_path("paper", ArtifactKind::FiguresSummary),
            PathBuf::from("/out/figures_in_articles.png")
        );
        assert_eq!(s.summary_path(), PathBuf::from("/out/figures_in_articles.png"));
    }

    #[test]
    fn only_network_kinds_have_endpoints() {
        let with_endpoint: Vec<_> = ArtifactKind::ALL
            .into_iter()
            .filter(|k| k.endpoint().is_some())
            .collect();
        assert_eq!(
            with_endpoint,
            vec![
                ArtifactKind::FullText,
                ArtifactKind::Header,
                ArtifactKind::References,
                ArtifactKind::FigureVisualization
            ]
        );
        assert!(ArtifactKind::FiguresSummary.is_batch_level());
        assert!(!ArtifactKind::LinksList.is_batch_level());
    }

    #[test]
    fn write_new_marks_done_and_refuses_overwrite() {
        let (_dir, s) = store();
        assert!(!s.exists("a", ArtifactKind::FullText));
        assert!(!s.is_complete("a", ArtifactKind::FullText));

        s.write_new("a", ArtifactKind::FullText, b"<TEI/>").expect("first write");
        assert!(s.exists("a", ArtifactKind::FullText));
        assert_eq!(s.status("a", ArtifactKind::FullText), Some(ArtifactStatus::Done));
        assert!(s.is_complete("a", ArtifactKind::FullText));

        let err = s
            .write_new("a", ArtifactKind::FullText, b"<other/>")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(s.read("a", ArtifactKind::FullText).unwrap(), b"<TEI/>");
    }

    #[test]
    fn legacy_file_without_marker_counts_as_complete() {
        let (_dir, s) = store();
        s.ensure_dir("a", ArtifactKind::LinksList).unwrap();
        std::fs::write(s.artifact_path("a", ArtifactKind::LinksList), "http://x\n").unwrap();
        let rec = s.record("a", ArtifactKind::LinksList);
        assert!(rec.present);
        assert_eq!(rec.status, None);
        assert!(rec.is_complete());
    }

    #[test]
    fn pending_and_failed_are_never_complete() {
        let (_dir, s) = store();
        s.ensure_dir("a", ArtifactKind::Header).unwrap();
        std::fs::write(s.artifact_path("a", ArtifactKind::Header), "<TEI/>").unwrap();

        s.mark("a", ArtifactKind::Header, ArtifactStatus::Pending, None).unwrap();
        assert!(!s.is_complete("a", ArtifactKind::Header));

        s.mark("a", ArtifactKind::Header, ArtifactStatus::Failed, Some("HTTP 503"))
            .unwrap();
        assert!(!s.is_complete("a", ArtifactKind::Header));
    }

    #[test]
    fn discard_incomplete_only_touches_unfinished_files() {
        let (_dir, s) = store();
        assert!(!s.discard_incomplete("a", ArtifactKind::FullText).unwrap());

        s.write_new("a", ArtifactKind::FullText, b"<TEI/>").unwrap();
        assert!(!s.discard_incomplete("a", ArtifactKind::FullText).unwrap());
        assert!(s.exists("a", ArtifactKind::FullText));

        s.mark("a", ArtifactKind::FullText, ArtifactStatus::Pending, None).unwrap();
        assert!(s.discard_incomplete("a", ArtifactKind::FullText).unwrap());
        assert!(!s.exists("a", ArtifactKind::FullText));
        s.write_new("a", ArtifactKind::FullText, b"<TEI>again</TEI>").unwrap();
        assert!(s.is_complete("a", ArtifactKind::FullText));
    }

    #[test]
    fn empty_result_is_complete_without_a_file() {
        let (_dir, s) = store();
        s.mark("a", ArtifactKind::KeywordCloud, ArtifactStatus::EmptyResult, Some("no abstract"))
            .unwrap();
        let rec = s.record("a", ArtifactKind::KeywordCloud);
        assert!(!rec.present);
        assert!(rec.is_complete());
    }

    #[test]
    fn done_marker_without_file_is_not_complete() {
        let (_dir, s) = store();
        s.mark("a", ArtifactKind::FullText, ArtifactStatus::Done, None).unwrap();
        assert!(!s.is_complete("a", ArtifactKind::FullText));
    }

    #[test]
    fn corrupt_marker_reads_as_pending() {
        let (_dir, s) = store();
        s.ensure_dir("a", ArtifactKind::FullText).unwrap();
        std::fs::write(s.artifact_path("a", ArtifactKind::FullText), "<TEI/>").unwrap();
        std::fs::write(s.marker_path("a", ArtifactKind::FullText), "{not json").unwrap();
        assert_eq!(s.status("a", ArtifactKind::FullText), Some(ArtifactStatus::Pending));
        assert!(!s.is_complete("a", ArtifactKind::FullText));
    }

    #[test]
    fn sentinel_is_written_as_empty_result() {
        let (_dir, s) = store();
        let path = s
            .write_sentinel("a", ArtifactKind::LinksList, NO_LINKS_SENTINEL)
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), NO_LINKS_SENTINEL);
        assert_eq!(
            s.status("a", ArtifactKind::LinksList),
            Some(ArtifactStatus::EmptyResult)
        );
    }

    #[test]
    fn summary_can_be_replaced() {
        let (_dir, s) = store();
        s.replace_summary(b"one").unwrap();
        s.replace_summary(b"two").unwrap();
        assert_eq!(std::fs::read(s.summary_path()).unwrap(), b"two");
    }

    #[test]
    fn no_partial_files_left_behind() {
        let (_dir, s) = store();
        s.write_new("a", ArtifactKind::FullText, b"<TEI/>").unwrap();
        let dir = s.ensure_dir("a", ArtifactKind::FullText).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".partial-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
