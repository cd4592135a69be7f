//! Per-document pipeline stages.
//!
//! Each submodule implements one step; the batch driver in [`crate::batch`]
//! wires them together and decides, via the artifact store, which steps are
//! needed at all.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ submit ──▶ extract ──▶ wordcloud / chart ──▶ encode
//! (*.pdf)   (HTTP)     (TEI, BibTeX)  (raster drawing)     (PNG)
//! ```
//!
//! 1. [`input`]     — list the PDFs of the input folder in lexicographic order
//! 2. [`submit`]    — multipart upload to one extraction endpoint, no retry
//! 3. [`extract`]   — abstract, links and figure counts from the payloads
//! 4. [`wordcloud`] — tokenise, weigh and lay out words on a spiral
//! 5. [`chart`]     — figures-per-article bar chart
//! 6. [`render`]    — runs 4 and 5 in `spawn_blocking` and encodes via
//!    [`encode`]; [`font`] finds the TrueType font both need

pub mod chart;
pub mod encode;
pub mod extract;
pub mod font;
pub mod input;
pub mod render;
pub mod submit;
pub mod wordcloud;
