//! Document discovery: list the source PDFs of the input folder.
//!
//! Only regular files directly inside the folder whose extension is `pdf`
//! (any case) are documents. Sub-folders are ignored, which matters when the
//! output tree is written into the input folder itself: per-document
//! artifact folders sit next to the PDFs and must not be picked up.

use crate::error::HarvestError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One input PDF. `id` is the file name without its extension and names the
/// document's artifact folder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SourceDocument {
    pub id: String,
    pub path: PathBuf,
}

impl SourceDocument {
    /// `None` unless `path` has a `pdf` extension and a UTF-8 stem.
    pub fn from_path(path: &Path) -> Option<Self> {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return None;
        }
        let id = path.file_stem()?.to_str()?.to_string();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            path: path.to_path_buf(),
        })
    }
}

/// Every document in `folder`, sorted by id.
///
/// Ids are unique: files that differ only in extension case (`a.pdf`,
/// `a.PDF`) would share one artifact folder, so only the first by path is
/// kept and the rest are skipped with a warning.
pub fn discover_documents(folder: &Path) -> Result<Vec<SourceDocument>, HarvestError> {
    if !folder.is_dir() {
        return Err(HarvestError::InputFolderNotFound {
            path: folder.to_path_buf(),
        });
    }
    let unreadable = |source| HarvestError::InputFolderUnreadable {
        path: folder.to_path_buf(),
        source,
    };

    let mut docs = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match SourceDocument::from_path(&path) {
            Some(doc) => docs.push(doc),
            None => debug!("Ignoring non-PDF entry {}", path.display()),
        }
    }
    docs.sort();
    docs.dedup_by(|later, kept| {
        let duplicate = later.id == kept.id;
        if duplicate {
            warn!(
                "Skipping {}: document id '{}' already taken by {}",
                later.path.display(),
                later.id,
                kept.path.display()
            );
        }
        duplicate
    });
    info!("Found {} PDF document(s) in {}", docs.len(), folder.display());
    Ok(docs)
}
