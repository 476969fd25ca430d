//! Positioned text fragments.

use serde::{Deserialize, Serialize};

/// One positioned run of text extracted from a PDF page.
///
/// Coordinates are top-left based with `y` growing downward, in the
/// unscaled page space shared by every page of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// The literal glyph run.
    pub text: String,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Advance width of the run.
    pub width: f64,
    /// Height of the run (font size proxy).
    pub height: f64,
}

impl TextFragment {
    /// Create a fragment with `x` and `y` rounded to one decimal digit.
    ///
    /// `width` and `height` are kept as given.
    pub fn new(text: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
        }
        .rounded()
    }

    /// Return a copy with `x` and `y` rounded to one decimal digit.
    pub fn rounded(mut self) -> Self {
        self.x = round_tenth(self.x);
        self.y = round_tenth(self.y);
        self
    }

    /// Right edge of the fragment.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Check whether the fragment carries only whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Round to one decimal digit.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
