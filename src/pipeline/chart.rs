//! Figures-per-article bar chart.
//!
//! One bar per document, sorted by document id, with the figure count as
//! height. Document ids go under the bars, rotated 90° so long ids stay
//! legible. Text needs a font; without one the bars and axes are still
//! drawn.

use ab_glyph::{Font, PxScale};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

const HEIGHT: u32 = 600;
const MIN_PLOT_WIDTH: u32 = 640;
const MARGIN_LEFT: u32 = 70;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 60;
const MARGIN_BOTTOM: u32 = 190;
const SLOT_WIDTH: u32 = 48;
const BAR_WIDTH: u32 = 32;
const MAX_LABEL_CHARS: usize = 28;
const MAX_TICKS: usize = 8;

const TITLE_SCALE: f32 = 22.0;
const LABEL_SCALE: f32 = 14.0;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const GRID: Rgba<u8> = Rgba([225, 225, 225, 255]);
const BAR: Rgba<u8> = Rgba([31, 119, 180, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub const CHART_TITLE: &str = "Figures per article";

/// Figure count of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureCount {
    pub doc_id: String,
    pub figures: usize,
}

impl FigureCount {
    pub fn new(doc_id: impl Into<String>, figures: usize) -> Self {
        Self {
            doc_id: doc_id.into(),
            figures,
        }
    }
}

/// Smallest 1/2/5 × 10ⁿ step giving at most [`MAX_TICKS`] intervals.
fn tick_step(max_value: usize) -> usize {
    let mut magnitude = 1usize;
    loop {
        for m in [1, 2, 5] {
            let step = m * magnitude;
            if max_value.div_ceil(step) <= MAX_TICKS {
                return step;
            }
        }
        magnitude *= 10;
    }
}

fn truncate_label(id: &str) -> String {
    if id.chars().count() > MAX_LABEL_CHARS {
        let cut: String = id.chars().take(MAX_LABEL_CHARS - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        id.to_string()
    }
}

/// Draw the chart. `None` when `counts` is empty.
pub fn build_figures_summary<F: Font>(counts: &[FigureCount], font: Option<&F>) -> Option<RgbaImage> {
    if counts.is_empty() {
        return None;
    }
    let mut bars: Vec<&FigureCount> = counts.iter().collect();
    bars.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));

    let plot_width = (bars.len() as u32 * SLOT_WIDTH).max(MIN_PLOT_WIDTH);
    let width = MARGIN_LEFT + plot_width + MARGIN_RIGHT;
    let plot_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let plot_bottom = MARGIN_TOP + plot_height;
    let slot = plot_width as f32 / bars.len() as f32;

    let max_figures = bars.iter().map(|c| c.figures).max().unwrap_or(0).max(1);
    let step = tick_step(max_figures);
    let axis_max = max_figures.div_ceil(step) * step;
    let y_of = |v: usize| plot_bottom as f32 - v as f32 / axis_max as f32 * plot_height as f32;

    let mut canvas = RgbaImage::from_pixel(width, HEIGHT, WHITE);
    let label_scale = PxScale::from(LABEL_SCALE);

    // Grid and y tick labels.
    for tick in (0..=axis_max).step_by(step) {
        let y = y_of(tick);
        draw_line_segment_mut(
            &mut canvas,
            (MARGIN_LEFT as f32, y),
            ((MARGIN_LEFT + plot_width) as f32, y),
            GRID,
        );
        if let Some(font) = font {
            let text = tick.to_string();
            let (tw, th) = text_size(label_scale, font, &text);
            let x = MARGIN_LEFT as i32 - 8 - tw as i32;
            draw_text_mut(&mut canvas, BLACK, x, y as i32 - th as i32 / 2, label_scale, font, &text);
        }
    }

    for (i, count) in bars.iter().enumerate() {
        let center = MARGIN_LEFT as f32 + slot * (i as f32 + 0.5);
        let left = (center - BAR_WIDTH as f32 / 2.0).round() as i32;
        let top = y_of(count.figures).round() as i32;
        let bar_height = plot_bottom as i32 - top;
        if bar_height > 0 {
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(left, top).of_size(BAR_WIDTH, bar_height as u32),
                BAR,
            );
        }
        let Some(font) = font else { continue };

        let value = count.figures.to_string();
        let (vw, vh) = text_size(label_scale, font, &value);
        draw_text_mut(
            &mut canvas,
            BLACK,
            center as i32 - vw as i32 / 2,
            top - vh as i32 - 4,
            label_scale,
            font,
            &value,
        );

        let label = truncate_label(&count.doc_id);
        let (lw, lh) = text_size(label_scale, font, &label);
        if lw == 0 || lh == 0 {
            continue;
        }
        let mut label_img = RgbaImage::from_pixel(lw + 2, lh + 4, TRANSPARENT);
        draw_text_mut(&mut label_img, BLACK, 1, 1, label_scale, font, &label);
        let rotated = imageops::rotate270(&label_img);
        imageops::overlay(
            &mut canvas,
            &rotated,
            (center - rotated.width() as f32 / 2.0) as i64,
            (plot_bottom + 6) as i64,
        );
    }

    // Axes on top of the grid and bars.
    draw_line_segment_mut(
        &mut canvas,
        (MARGIN_LEFT as f32, MARGIN_TOP as f32),
        (MARGIN_LEFT as f32, plot_bottom as f32),
        BLACK,
    );
    draw_line_segment_mut(
        &mut canvas,
        (MARGIN_LEFT as f32, plot_bottom as f32),
        ((MARGIN_LEFT + plot_width) as f32, plot_bottom as f32),
        BLACK,
    );

    if let Some(font) = font {
        let scale = PxScale::from(TITLE_SCALE);
        let (tw, _) = text_size(scale, font, CHART_TITLE);
        let x = (width as i32 - tw as i32) / 2;
        draw_text_mut(&mut canvas, BLACK, x, 18, scale, font, CHART_TITLE);
    }

    Some(canvas)
}
