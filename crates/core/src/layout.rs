//! Reconstructs page text from positioned OCR words.
//!
//! Words are grouped into lines by quantizing their top coordinate, ordered
//! left to right, and joined with a space. A horizontal gap wider than
//! [`LayoutConfig::column_gap`] becomes a tab so that table columns survive as
//! tab-separated fields.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// One recognized token with its pixel-space bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Word {
    pub fn new(text: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width: 0,
            height: 0,
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Tuning knobs for line grouping and column detection.
///
/// The defaults are calibrated for pages rendered at 300 DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Height of the vertical bucket words are snapped to.
    pub line_bucket: u32,
    /// Gap (in pixels) past the estimated end of the previous word that starts a new column.
    pub column_gap: i32,
    /// Estimated glyph width used to guess where a word ends.
    pub char_width: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_bucket: 10,
            column_gap: 50,
            char_width: 5,
        }
    }
}

/// Words sharing one quantized vertical position, sorted by `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub y: i32,
    pub words: Vec<Word>,
}

impl Line {
    pub fn render(&self, config: &LayoutConfig) -> String {
        let mut text = String::new();
        let mut prev_end: Option<i32> = None;
        for word in &self.words {
            if let Some(end) = prev_end {
                if word.x.saturating_sub(end) > config.column_gap {
                    text.push('\t');
                } else {
                    text.push(' ');
                }
            }
            text.push_str(&word.text);
            prev_end = Some(word.x.saturating_add(estimated_width(&word.text, config)));
        }
        text.trim().to_string()
    }
}

/// Snaps `y` to the nearest multiple of `bucket`, rounding halves to even.
pub fn quantize_y(y: i32, bucket: u32) -> i32 {
    let bucket = f64::from(bucket.max(1));
    ((f64::from(y) / bucket).round_ties_even() * bucket) as i32
}

/// Groups non-blank words into lines ordered top to bottom.
pub fn group_lines<I>(words: I, config: &LayoutConfig) -> Vec<Line>
where
    I: IntoIterator<Item = Word>,
{
    words
        .into_iter()
        .filter(|word| !word.is_blank())
        .into_group_map_by(|word| quantize_y(word.y, config.line_bucket))
        .into_iter()
        .sorted_by_key(|(y, _)| *y)
        .map(|(y, mut words)| {
            words.sort_by_key(|word| word.x);
            Line { y, words }
        })
        .collect()
}

/// Serializes a page: every line rendered and terminated by `\n`.
///
/// A page without recognized words yields an empty string.
pub fn reconstruct_page_text<I>(words: I, config: &LayoutConfig) -> String
where
    I: IntoIterator<Item = Word>,
{
    let mut page = String::new();
    for line in group_lines(words, config) {
        page.push_str(&line.render(config));
        page.push('\n');
    }
    page
}

fn estimated_width(text: &str, config: &LayoutConfig) -> i32 {
    let chars = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
    chars.saturating_mul(config.char_width)
}
