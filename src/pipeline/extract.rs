//! Text extraction from service payloads.
//!
//! Three small, pure post-processors:
//!
//! - [`extract_abstract`] — header payload (TEI XML or BibTeX) → abstract text
//! - [`extract_links`] — references TEI → sorted, de-duplicated http links
//! - [`count_figures`] — full-text TEI → number of `figure` elements
//!
//! None of them fail the batch. Malformed markup is logged and read as
//! "nothing found".

use crate::config::XmlNamespaces;
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// Structural variant of a header payload, decided by its first
/// non-whitespace character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Starts with `<`.
    Xml,
    /// Starts with `@` (a BibTeX entry such as `@article{…}`).
    Bibtex,
    Unknown,
}

pub fn detect_format(payload: &str) -> PayloadFormat {
    match payload.trim_start().chars().next() {
        Some('<') => PayloadFormat::Xml,
        Some('@') => PayloadFormat::Bibtex,
        _ => PayloadFormat::Unknown,
    }
}

/// Extract the abstract from a header payload, whichever format it is in.
///
/// Returns `None` (with a log line) for unknown formats, unparsable XML,
/// a missing abstract, or an abstract that is empty after trimming.
pub fn extract_abstract(payload: &str, ns: &XmlNamespaces) -> Option<String> {
    let text = match detect_format(payload) {
        PayloadFormat::Xml => extract_abstract_from_xml(payload, ns),
        PayloadFormat::Bibtex => extract_abstract_from_bibtex(payload),
        PayloadFormat::Unknown => {
            warn!("Unrecognised header payload format; no abstract extracted");
            None
        }
    }?;
    if text.is_empty() {
        debug!("Abstract element present but empty");
        None
    } else {
        Some(text)
    }
}

/// Text of the first `abstract` element (any depth), all descendant text
/// nodes concatenated and trimmed.
pub fn extract_abstract_from_xml(xml: &str, ns: &XmlNamespaces) -> Option<String> {
    let doc = match parse_xml(xml) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to parse header XML: {}", e);
            return None;
        }
    };
    let Some(node) = doc
        .descendants()
        .find(|n| is_named_element(n, "abstract", ns))
    else {
        warn!("No <abstract> element in header XML");
        return None;
    };
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    Some(text.trim().to_string())
}

static RE_BIBTEX_ABSTRACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)abstract\s*=\s*\{(.*?)\}").unwrap());

/// Contents of the first `abstract = {…}` field, trimmed.
///
/// Matching is non-greedy up to the first closing brace, so an abstract with
/// nested braces is cut at the first `}`.
pub fn extract_abstract_from_bibtex(bibtex: &str) -> Option<String> {
    match RE_BIBTEX_ABSTRACT.captures(bibtex) {
        Some(caps) => Some(caps[1].trim().to_string()),
        None => {
            warn!("No 'abstract' field in BibTeX payload");
            None
        }
    }
}

/// Every `target` attribute value starting with `http`, de-duplicated and
/// sorted lexicographically. Unparsable markup yields an empty list.
pub fn extract_links(xml: &str) -> Vec<String> {
    let doc = match parse_xml(xml) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to parse references XML: {}", e);
            return Vec::new();
        }
    };
    let links: BTreeSet<&str> = doc
        .descendants()
        .filter(|n| n.is_element())
        .filter_map(|n| n.attribute("target"))
        .filter(|t| t.starts_with("http"))
        .collect();
    links.into_iter().map(str::to_string).collect()
}

/// Number of `figure` elements anywhere in the tree.
pub fn count_figures(xml: &str, ns: &XmlNamespaces) -> Result<usize, roxmltree::Error> {
    let doc = parse_xml(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| is_named_element(n, "figure", ns))
        .count())
}

/// [`count_figures`] over a file; 0 (logged) when the file is missing or
/// unparsable.
pub fn count_figures_in_file(path: &Path, ns: &XmlNamespaces) -> usize {
    let xml = match std::fs::read_to_string(path) {
        Ok(xml) => xml,
        Err(e) => {
            warn!("Cannot read {} for figure count: {}", path.display(), e);
            return 0;
        }
    };
    match count_figures(&xml, ns) {
        Ok(n) => n,
        Err(e) => {
            warn!("Cannot parse {} for figure count: {}", path.display(), e);
            0
        }
    }
}

fn parse_xml(xml: &str) -> Result<Document<'_>, roxmltree::Error> {
    // Service output may carry a DOCTYPE; entities are never fetched.
    let opts = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(xml, opts)
}

fn is_named_element(node: &Node<'_, '_>, local: &str, ns: &XmlNamespaces) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && ns.accepts(node.tag_name().namespace())
}
