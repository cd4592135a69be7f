//! Image rendering off the async runtime.
//!
//! Glyph rasterisation and spiral placement are CPU-bound, so both renderers
//! run inside `tokio::task::spawn_blocking` and hand back encoded PNG bytes.

use crate::config::WordCloudOptions;
use crate::error::RenderError;
use crate::pipeline::chart::{build_figures_summary, FigureCount};
use crate::pipeline::encode::encode_png;
use crate::pipeline::font::load_font;
use crate::pipeline::wordcloud::render_word_cloud;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Render a keyword cloud of `text` as PNG.
///
/// A configured font path that does not exist is an error; without one the
/// system or bundled font is used.
///
/// # Returns
/// `Ok(None)` when the text contains no usable words.
pub async fn render_keyword_cloud_png(
    text: String,
    opts: WordCloudOptions,
    font_path: Option<PathBuf>,
) -> Result<Option<Vec<u8>>, RenderError> {
    tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, RenderError> {
        let font = load_font(font_path.as_deref())?;
        let Some(img) = render_word_cloud(&text, &opts, &font) else {
            debug!("No words to draw");
            return Ok(None);
        };
        Ok(Some(encode_png(&img)?))
    })
    .await
    .map_err(|e| RenderError::Task(format!("Word cloud task panicked: {}", e)))?
}

/// Render the figures-per-article chart as PNG.
///
/// If the configured font cannot be loaded the chart is still produced,
/// just unlabelled.
pub async fn render_figures_summary_png(
    counts: Vec<FigureCount>,
    font_path: Option<PathBuf>,
) -> Result<Option<Vec<u8>>, RenderError> {
    tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, RenderError> {
        let font = match load_font(font_path.as_deref()) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Drawing figures chart without labels: {}", e);
                None
            }
        };
        match build_figures_summary(&counts, font.as_ref()) {
            Some(img) => Ok(Some(encode_png(&img)?)),
            None => Ok(None),
        }
    })
    .await
    .map_err(|e| RenderError::Task(format!("Chart task panicked: {}", e)))?
}
