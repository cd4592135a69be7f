//! TrueType font lookup for word clouds and chart labels.
//!
//! Order: the configured path (which must exist), then the first system
//! candidate, then DejaVu Sans compiled into the binary. Rendering therefore
//! never lacks a font unless a configured path is wrong.

use crate::error::RenderError;
use ab_glyph::FontArc;
use std::path::{Path, PathBuf};
use tracing::debug;

/// DejaVu Sans (Bitstream Vera licence, see `assets/fonts/DejaVuSans-LICENSE.txt`).
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Searched in order when no font path is configured.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// First existing font file: the explicit path if given, else the first
/// system candidate that exists. `None` means the bundled font applies.
pub fn locate_font(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return p.is_file().then(|| p.to_path_buf());
    }
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

pub fn load_font(explicit: Option<&Path>) -> Result<FontArc, RenderError> {
    match locate_font(explicit) {
        Some(path) => load_font_file(path),
        None => match explicit {
            Some(path) => Err(RenderError::FontNotFound {
                path: path.to_path_buf(),
            }),
            None => bundled_font(),
        },
    }
}

/// The font compiled into the crate.
pub fn bundled_font() -> Result<FontArc, RenderError> {
    debug!("Using bundled DejaVu Sans");
    FontArc::try_from_slice(BUNDLED_FONT).map_err(|_| RenderError::FontInvalid {
        path: PathBuf::from("<bundled DejaVuSans.ttf>"),
    })
}

fn load_font_file(path: PathBuf) -> Result<FontArc, RenderError> {
    let data = std::fs::read(&path).map_err(|source| RenderError::FontUnreadable {
        path: path.clone(),
        source,
    })?;
    let font = FontArc::try_from_vec(data).map_err(|_| RenderError::FontInvalid { path: path.clone() })?;
    debug!("Loaded font {}", path.display());
    Ok(font)
}
