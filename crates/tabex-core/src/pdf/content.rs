//! Content stream walker tracking the text and graphics state.
//!
//! Only what positions text is modelled: the CTM, the text and line
//! matrices, font size, spacing, leading and horizontal scaling. `q`/`Q`
//! save and restore the CTM together with the text state.
//!
//! Shown strings are decoded through the font's encoding (`/Encoding` or
//! `/ToUnicode`) when lopdf can build one, and fall back to a plain byte
//! decode otherwise.

use std::collections::HashMap;

use lopdf::content::Operation;
use lopdf::{Document, Encoding, Object};
use tracing::trace;

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Glyph width used when a font carries no `Widths`, in 1/1000 text space.
const DEFAULT_GLYPH_WIDTH: f64 = 500.0;

/// `/DW` of a CID font that does not declare one.
pub(crate) const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// `TJ` adjustment (1/1000 em, negative moves right) treated as a word break.
const TJ_SPACE_THRESHOLD: f64 = -300.0;

/// Glyph widths of a font.
///
/// Simple fonts index `widths` by one-byte code from `first_char`. Composite
/// (Type0) fonts use two-byte codes and take their widths from `cid`.
#[derive(Debug, Clone, Default)]
pub(crate) struct FontMetrics {
    pub first_char: i64,
    pub widths: Vec<f64>,
    pub cid: Option<CidWidths>,
}

/// Widths of a CID font, from the descendant font's `/W` and `/DW`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CidWidths {
    pub default_width: f64,
    /// Inclusive code ranges and their width.
    pub ranges: Vec<(u32, u32, f64)>,
}

impl Default for CidWidths {
    fn default() -> Self {
        Self {
            default_width: DEFAULT_CID_WIDTH,
            ranges: Vec::new(),
        }
    }
}

impl CidWidths {
    fn width(&self, code: u32) -> f64 {
        self.ranges
            .iter()
            .find(|(first, last, _)| (*first..=*last).contains(&code))
            .map_or(self.default_width, |(_, _, w)| *w)
    }
}

impl FontMetrics {
    /// Split a shown string into character codes.
    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.cid.is_some() {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0u32, |code, &b| code << 8 | b as u32))
                .collect()
        } else {
            bytes.iter().map(|&b| b as u32).collect()
        }
    }

    fn glyph_width(&self, code: u32) -> f64 {
        if let Some(cid) = &self.cid {
            return cid.width(code);
        }
        let idx = code as i64 - self.first_char;
        if idx < 0 {
            return DEFAULT_GLYPH_WIDTH;
        }
        self.widths
            .get(idx as usize)
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_GLYPH_WIDTH)
    }
}

/// A font resource of the page being walked.
#[derive(Debug, Default)]
pub(crate) struct PageFont<'a> {
    pub metrics: FontMetrics,
    /// Text decoding, when lopdf could derive one from the font dictionary.
    pub encoding: Option<Encoding<'a>>,
}

impl PageFont<'_> {
    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(encoding) = &self.encoding {
            match Document::decode_text(encoding, bytes) {
                Ok(text) => return text,
                Err(e) => trace!("Font decode failed ({}), decoding bytes directly", e),
            }
        }
        decode_string(bytes)
    }
}

/// A shown text run in default user space (PDF coordinates, `y` up).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextRun {
    pub text: String,
    pub x: f64,
    pub baseline: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
struct TextState {
    font: Vec<u8>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scaling: f64,
    leading: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
        }
    }
}

/// Walks decoded content stream operations and collects text runs.
pub(crate) struct ContentWalker<'a> {
    fonts: &'a HashMap<Vec<u8>, PageFont<'a>>,
    ctm: Matrix,
    saved: Vec<(Matrix, TextState)>,
    tm: Matrix,
    tlm: Matrix,
    state: TextState,
    runs: Vec<TextRun>,
}

impl<'a> ContentWalker<'a> {
    pub fn new(fonts: &'a HashMap<Vec<u8>, PageFont<'a>>) -> Self {
        Self {
            fonts,
            ctm: IDENTITY,
            saved: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            state: TextState::default(),
            runs: Vec::new(),
        }
    }

    /// Process every operation and return the text runs in stream order.
    pub fn walk(mut self, operations: &[Operation]) -> Vec<TextRun> {
        for op in operations {
            self.apply(op);
        }
        self.runs
    }

    fn apply(&mut self, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => self.saved.push((self.ctm, self.state.clone())),
            "Q" => {
                if let Some((ctm, state)) = self.saved.pop() {
                    self.ctm = ctm;
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.ctm = multiply(&m, &self.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "ET" => {}
            "Tf" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    self.state.font = name.to_vec();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            }
            "Tc" => self.set_number(operands, |s, v| s.char_spacing = v),
            "Tw" => self.set_number(operands, |s, v| s.word_spacing = v),
            "Tz" => self.set_number(operands, |s, v| s.horizontal_scaling = v / 100.0),
            "TL" => self.set_number(operands, |s, v| s.leading = v),
            "Td" => {
                if let Some((tx, ty)) = pair_operand(operands) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = pair_operand(operands) {
                    self.state.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&[Shown::Text(bytes)]);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&[Shown::Text(bytes)]);
                }
            }
            "\"" => {
                if let Some((aw, ac)) = pair_operand(operands) {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(&[Shown::Text(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let shown: Vec<Shown> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(Shown::Text(bytes)),
                            other => number(other).map(Shown::Adjust),
                        })
                        .collect();
                    self.show(&shown);
                }
            }
            _ => {}
        }
    }

    fn set_number(&mut self, operands: &[Object], set: impl FnOnce(&mut TextState, f64)) {
        if let Some(value) = operands.first().and_then(number) {
            set(&mut self.state, value);
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    /// Show strings and kerning adjustments as one run starting at the
    /// current text position.
    fn show(&mut self, shown: &[Shown]) {
        let fonts = self.fonts;
        let font = fonts.get(&self.state.font);
        let fallback = FontMetrics::default();
        let metrics = font.map_or(&fallback, |f| &f.metrics);
        let size = self.state.font_size;
        let scaling = self.state.horizontal_scaling;

        let start = multiply(&self.tm, &self.ctm);
        let mut text = String::new();
        let mut advance = 0.0;

        for item in shown {
            match item {
                Shown::Text(bytes) => {
                    for code in metrics.codes(bytes) {
                        let glyph = metrics.glyph_width(code);
                        let mut tx = glyph / 1000.0 * size + self.state.char_spacing;
                        // Word spacing applies to the single-byte code 32 only.
                        if code == 32 && metrics.cid.is_none() {
                            tx += self.state.word_spacing;
                        }
                        advance += tx * scaling;
                    }
                    match font {
                        Some(font) => text.push_str(&font.decode(bytes)),
                        None => text.push_str(&decode_string(bytes)),
                    }
                }
                Shown::Adjust(amount) => {
                    if *amount <= TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    advance -= amount / 1000.0 * size * scaling;
                }
            }
        }

        self.tm[4] += advance * self.tm[0];
        self.tm[5] += advance * self.tm[1];

        if text.is_empty() {
            return;
        }

        let x_scale = (start[0] * start[0] + start[1] * start[1]).sqrt();
        let y_scale = (start[2] * start[2] + start[3] * start[3]).sqrt();
        let run = TextRun {
            text,
            x: start[4],
            baseline: start[5],
            width: (advance * x_scale).abs(),
            height: (size * y_scale).abs(),
        };
        trace!("Text run {:?}", run);
        self.runs.push(run);
    }
}

enum Shown<'b> {
    Text(&'b [u8]),
    Adjust(f64),
}

/// Read a numeric operand.
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn pair_operand(operands: &[Object]) -> Option<(f64, f64)> {
    Some((number(operands.first()?)?, number(operands.get(1)?)?))
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(m)
}

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Decode a string operand without font information.
///
/// UTF-16BE when BOM-prefixed, otherwise one byte per character (Latin-1).
fn decode_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }

    bytes.iter().map(|&b| b as char).collect()
}
