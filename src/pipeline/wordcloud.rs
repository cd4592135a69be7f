//! Word-cloud rendering.
//!
//! Pipeline: tokenise → drop stop-words → count → size by relative
//! frequency → place on an Archimedean spiral from the canvas centre →
//! draw. Placement is deterministic for a given text and font.

use crate::config::WordCloudOptions;
use ab_glyph::{Font, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Pixels kept free around every word.
const PADDING: i32 = 2;
/// Radians advanced per spiral step.
const SPIRAL_STEP: f32 = 0.1;
/// Radius growth (px) per radian.
const SPIRAL_GROWTH: f32 = 1.5;
/// Successive size reduction when a word does not fit.
const SHRINK_FACTOR: f32 = 0.85;
/// Share of the previous font size tied to relative frequency.
const RELATIVE_SCALING: f32 = 0.5;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Dark end of viridis; the yellow tail is unreadable on white.
const PALETTE: [Rgba<u8>; 8] = [
    Rgba([68, 1, 84, 255]),
    Rgba([72, 40, 120, 255]),
    Rgba([62, 74, 137, 255]),
    Rgba([49, 104, 142, 255]),
    Rgba([38, 130, 142, 255]),
    Rgba([31, 158, 137, 255]),
    Rgba([53, 183, 121, 255]),
    Rgba([109, 205, 89, 255]),
];

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w[\w']+").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "can't", "cannot", "could", "couldn't", "did",
        "didn't", "do", "does", "doesn't", "doing", "don't", "down", "during", "each", "else",
        "ever", "few", "for", "from", "further", "get", "had", "hadn't", "has", "hasn't", "have",
        "haven't", "having", "he", "he'd", "he'll", "he's", "her", "here", "here's", "hers",
        "herself", "him", "himself", "his", "how", "how's", "however", "i", "i'd", "i'll",
        "i'm", "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself", "just",
        "let's", "like", "me", "more", "most", "mustn't", "my", "myself", "no", "nor", "not",
        "of", "off", "on", "once", "only", "or", "other", "otherwise", "ought", "our", "ours",
        "ourselves", "out", "over", "own", "same", "shall", "shan't", "she", "she'd", "she'll",
        "she's", "should", "shouldn't", "since", "so", "some", "such", "than", "that",
        "that's", "the", "their", "theirs", "them", "themselves", "then", "there", "there's",
        "therefore", "these", "they", "they'd", "they'll", "they're", "they've", "this",
        "those", "through", "to", "too", "under", "until", "up", "us", "very", "was", "wasn't",
        "we", "we'd", "we'll", "we're", "we've", "were", "weren't", "what", "what's", "when",
        "when's", "where", "where's", "which", "while", "who", "who's", "whom", "why", "why's",
        "will", "with", "won't", "would", "wouldn't", "you", "you'd", "you'll", "you're",
        "you've", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// A word with its frequency relative to the most frequent word (0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedWord {
    pub text: String,
    pub count: usize,
    pub weight: f32,
}

/// A word placed on the canvas. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub font_size: f32,
    pub color: Rgba<u8>,
}

impl PlacedWord {
    fn overlaps(&self, x: i32, y: i32, w: u32, h: u32) -> bool {
        x < self.x + self.width as i32 + PADDING
            && self.x < x + w as i32 + PADDING
            && y < self.y + self.height as i32 + PADDING
            && self.y < y + h as i32 + PADDING
    }
}

/// Count words (lower-cased, stop-words and a trailing `'s` removed) and
/// keep the `max_words` most frequent. Ties break alphabetically.
pub fn word_frequencies(text: &str, max_words: usize) -> Vec<WeightedWord> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for m in RE_WORD.find_iter(text) {
        let lower = m.as_str().to_lowercase();
        let word = lower
            .strip_suffix("'s")
            .unwrap_or(&lower)
            .trim_end_matches('\'');
        if word.chars().count() < 2
            || word.chars().all(|c| c.is_numeric())
            || STOP_WORDS.contains(word)
        {
            continue;
        }
        *counts.entry(word.to_string()).or_default() += 1;
    }

    let mut words: Vec<(String, usize)> = counts.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(max_words);

    let top = words.first().map(|(_, c)| *c).unwrap_or(1) as f32;
    words
        .into_iter()
        .map(|(text, count)| WeightedWord {
            text,
            count,
            weight: count as f32 / top,
        })
        .collect()
}

/// Place `words` (most frequent first) on a `width × height` canvas.
///
/// `measure(text, font_size)` returns the pixel size of the rendered word.
/// Sizes follow the relative-scaling rule: each word starts from the
/// previous word's size scaled by their frequency ratio, then shrinks until
/// a free spot is found. Placement stops once a word would need to go below
/// `min_font_size`.
pub fn layout_words<M>(words: &[WeightedWord], opts: &WordCloudOptions, measure: M) -> Vec<PlacedWord>
where
    M: Fn(&str, f32) -> (u32, u32),
{
    let mut placed: Vec<PlacedWord> = Vec::with_capacity(words.len());
    let max_font = (opts.height as f32 * 0.25).max(opts.min_font_size);
    let mut font_size = max_font;
    let mut last_weight = 1.0_f32;

    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            let ratio = word.weight / last_weight;
            font_size = ((RELATIVE_SCALING * ratio + (1.0 - RELATIVE_SCALING)) * font_size).round();
        }
        let mut size = font_size.max(opts.min_font_size);
        let spot = loop {
            let (w, h) = measure(&word.text, size);
            if let Some((x, y)) = find_spot(&placed, opts.width, opts.height, w, h) {
                break Some((x, y, w, h));
            }
            if size <= opts.min_font_size {
                break None;
            }
            size = (size * SHRINK_FACTOR).max(opts.min_font_size);
        };
        let Some((x, y, width, height)) = spot else {
            break;
        };
        placed.push(PlacedWord {
            text: word.text.clone(),
            x,
            y,
            width,
            height,
            font_size: size,
            color: PALETTE[i % PALETTE.len()],
        });
        font_size = size;
        last_weight = word.weight;
    }
    placed
}

fn find_spot(placed: &[PlacedWord], width: u32, height: u32, w: u32, h: u32) -> Option<(i32, i32)> {
    if w == 0 || h == 0 || w > width || h > height {
        return None;
    }
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let aspect = height as f32 / width as f32;
    let max_radius = cx.hypot(cy);
    let mut t = 0.0_f32;
    loop {
        let r = SPIRAL_GROWTH * t;
        if r > max_radius {
            return None;
        }
        let x = (cx + r * t.cos() - w as f32 / 2.0).round() as i32;
        let y = (cy + r * aspect * t.sin() - h as f32 / 2.0).round() as i32;
        let inside = x >= 0 && y >= 0 && x + w as i32 <= width as i32 && y + h as i32 <= height as i32;
        if inside && !placed.iter().any(|p| p.overlaps(x, y, w, h)) {
            return Some((x, y));
        }
        t += SPIRAL_STEP;
    }
}

/// Render a word cloud of `text`. `None` when the text has no usable words.
pub fn render_word_cloud<F: Font>(text: &str, opts: &WordCloudOptions, font: &F) -> Option<RgbaImage> {
    let words = word_frequencies(text, opts.max_words);
    if words.is_empty() {
        return None;
    }
    let placed = layout_words(&words, opts, |w, size| text_size(PxScale::from(size), font, w));
    if placed.is_empty() {
        return None;
    }

    let mut canvas = RgbaImage::from_pixel(opts.width, opts.height, BACKGROUND);
    for word in &placed {
        draw_text_mut(
            &mut canvas,
            word.color,
            word.x,
            word.y,
            PxScale::from(word.font_size),
            font,
            &word.text,
        );
    }
    Some(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rough monospace metrics so layout can be tested without a font.
    fn fake_measure(text: &str, size: f32) -> (u32, u32) {
        ((text.chars().count() as f32 * size * 0.6).ceil() as u32, size.ceil() as u32)
    }

    #[test]
    fn frequencies_drop_stop_words_and_numbers() {
        let words = word_frequencies("The parser and the PARSER: 2024 parsing of a tree's tree", 10);
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["parser", "tree", "parsing"]);
        assert_eq!(words[0].count, 2);
        assert_eq!(words[1].count, 2);
        assert!((words[0].weight - 1.0).abs() < f32::EPSILON);
        assert!((words[2].weight - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn frequencies_respect_max_words() {
        let words = word_frequencies("alpha beta gamma delta alpha beta alpha", 2);
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[test]
    fn empty_or_stop_word_text_has_no_words() {
        assert!(word_frequencies("", 10).is_empty());
        assert!(word_frequencies("the and of a 12 34", 10).is_empty());
    }

    #[test]
    fn layout_places_words_without_overlap_inside_canvas() {
        let opts = WordCloudOptions::default();
        let text = "extraction service pipeline artifacts idempotent batch documents \
                    extraction pipeline extraction references figures keyword cloud";
        let words = word_frequencies(text, opts.max_words);
        let placed = layout_words(&words, &opts, fake_measure);

        assert_eq!(placed.len(), words.len());
        assert_eq!(placed[0].text, "extraction");
        for (i, a) in placed.iter().enumerate() {
            assert!(a.x >= 0 && a.y >= 0);
            assert!(a.x as u32 + a.width <= opts.width);
            assert!(a.y as u32 + a.height <= opts.height);
            for b in &placed[i + 1..] {
                assert!(!a.overlaps(b.x, b.y, b.width, b.height), "{} overlaps {}", a.text, b.text);
            }
        }
    }

    #[test]
    fn most_frequent_word_is_largest() {
        let opts = WordCloudOptions::default();
        let words = word_frequencies("graph graph graph graph node node edge", 10);
        let placed = layout_words(&words, &opts, fake_measure);
        assert!(placed[0].font_size >= placed[1].font_size);
        assert!(placed[1].font_size >= placed[2].font_size);
        assert!(placed.iter().all(|p| p.font_size >= opts.min_font_size));
    }

    #[test]
    fn layout_is_deterministic() {
        let opts = WordCloudOptions::default();
        let words = word_frequencies("one two three two three three", 10);
        assert_eq!(
            layout_words(&words, &opts, fake_measure),
            layout_words(&words, &opts, fake_measure)
        );
    }

    #[test]
    fn oversized_word_is_dropped() {
        let opts = WordCloudOptions {
            width: 100,
            height: 100,
            ..WordCloudOptions::default()
        };
        let words = word_frequencies(&"x".repeat(200), 10);
        assert!(layout_words(&words, &opts, fake_measure).is_empty());
    }
}
