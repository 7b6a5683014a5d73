//! Word extraction with font sizes, by walking a page's content stream.
//!
//! Every shown string is placed using the text matrix and advanced by its
//! glyph widths, then fragments are grouped into words by position, so text
//! drawn one glyph at a time still comes out as whole words.
//!
//! Only text drawn directly in the page content is seen; text inside form
//! XObjects is not followed.

use crate::chapters::source::Word;
use anyhow::{Context, Result};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// TJ adjustments below this (in thousandths of an em) are treated as word gaps
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// Glyph width used when the font gives none, in thousandths of an em
const DEFAULT_GLYPH_WIDTH: f32 = 600.0;

/// Fragments closer than this horizontally belong to the same word
const X_TOLERANCE: f32 = 3.0;

/// Fragments whose baselines differ by more than this are on different lines
const Y_TOLERANCE: f32 = 3.0;

/// Words on a page in content-stream order, each tagged with its rendered size.
pub fn extract_page_words(doc: &Document, page_id: ObjectId) -> Result<Vec<Word>> {
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc
        .get_page_content(page_id)
        .context("Failed to read page content")?;
    let content = Content::decode(&content_data).context("Failed to decode page content")?;

    let mut state = TextState::default();
    let mut words = WordBuilder::default();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix(operands) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }
            "BT" => {
                state.in_text = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => state.in_text = false,
            "Tf" => {
                if operands.len() >= 2 {
                    if let Ok(name) = operands[0].as_name() {
                        state.font = name.to_vec();
                        state.metrics = fonts
                            .get(name)
                            .map(|dict| FontMetrics::from_dict(doc, dict))
                            .unwrap_or_default();
                    }
                    if let Some(size) = number(&operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "Tc" => {
                if let Some(spacing) = operands.first().and_then(number) {
                    state.char_spacing = spacing;
                }
            }
            "Tw" => {
                if let Some(spacing) = operands.first().and_then(number) {
                    state.word_spacing = spacing;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if operands.len() >= 2 {
                    let tx = number(&operands[0]).unwrap_or(0.0);
                    let ty = number(&operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix(operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(obj) = operands.first() {
                    state.show(obj, doc, &fonts, &mut words, false);
                }
            }
            "'" => {
                state.next_line();
                if let Some(obj) = operands.first() {
                    state.show(obj, doc, &fonts, &mut words, false);
                }
            }
            "\"" => {
                if let Some(spacing) = operands.first().and_then(number) {
                    state.word_spacing = spacing;
                }
                if let Some(spacing) = operands.get(1).and_then(number) {
                    state.char_spacing = spacing;
                }
                state.next_line();
                if let Some(obj) = operands.get(2) {
                    state.show(obj, doc, &fonts, &mut words, false);
                }
            }
            "TJ" => {
                if let Some(Ok(array)) = operands.first().map(|o| o.as_array()) {
                    let mut gap = false;
                    for item in array {
                        match number(item) {
                            Some(adjust) => {
                                gap |= adjust < TJ_SPACE_THRESHOLD;
                                state.advance(-adjust / 1000.0 * state.font_size);
                            }
                            None => {
                                state.show(item, doc, &fonts, &mut words, gap);
                                gap = false;
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(words.finish())
}

/// Glyph widths of a simple font, in thousandths of an em.
#[derive(Debug, Clone, Default)]
struct FontMetrics {
    first_char: u32,
    widths: Vec<f32>,
    /// Type0 fonts use two-byte codes and are measured with the default width
    composite: bool,
}

impl FontMetrics {
    fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let composite = matches!(dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Type0"));
        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(number)
            .map_or(0, |n| n.max(0.0) as u32);
        let widths = dict
            .get(b"Widths")
            .ok()
            .and_then(|obj| doc.dereference(obj).ok())
            .and_then(|(_, obj)| obj.as_array().ok())
            .map(|array| {
                array
                    .iter()
                    .map(|w| number(w).unwrap_or(DEFAULT_GLYPH_WIDTH))
                    .collect()
            })
            .unwrap_or_default();
        FontMetrics {
            first_char,
            widths,
            composite,
        }
    }

    fn width(&self, code: u32) -> f32 {
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(DEFAULT_GLYPH_WIDTH)
    }

    /// Horizontal advance of a shown string in unscaled text space.
    fn advance(&self, bytes: &[u8], font_size: f32, char_spacing: f32, word_spacing: f32) -> f32 {
        if self.composite {
            let glyphs = (bytes.len() / 2) as f32;
            return glyphs * (DEFAULT_GLYPH_WIDTH / 1000.0 * font_size + char_spacing);
        }
        bytes
            .iter()
            .map(|&code| {
                let spacing = if code == b' ' { word_spacing } else { 0.0 };
                self.width(u32::from(code)) / 1000.0 * font_size + char_spacing + spacing
            })
            .sum()
    }
}

struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    font: Vec<u8>,
    metrics: FontMetrics,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    leading: f32,
    in_text: bool,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font: Vec::new(),
            metrics: FontMetrics::default(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            leading: 0.0,
            in_text: false,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f32, ty: f32) {
        let translate = [1.0, 0.0, 0.0, 1.0, tx, ty];
        self.line_matrix = multiply(&translate, &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            // approximate line height when TL was never set
            self.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    /// Move the text position along the baseline, without touching the line start.
    fn advance(&mut self, tx: f32) {
        let translate = [1.0, 0.0, 0.0, 1.0, tx, 0.0];
        self.text_matrix = multiply(&translate, &self.text_matrix);
    }

    /// Current text position in device space.
    fn position(&self) -> (f32, f32) {
        let m = multiply(&self.text_matrix, &self.ctm);
        (m[4], m[5])
    }

    /// Rendered size: font size scaled by the text matrix and CTM.
    fn rendered_size(&self) -> f32 {
        let m = multiply(&self.text_matrix, &self.ctm);
        let scale_x = (m[0].powi(2) + m[1].powi(2)).sqrt();
        let scale_y = (m[2].powi(2) + m[3].powi(2)).sqrt();
        (self.font_size * scale_x.max(scale_y)).abs()
    }

    /// Show one string operand: record it at the current position, then advance past it.
    fn show(
        &mut self,
        obj: &Object,
        doc: &Document,
        fonts: &BTreeMap<Vec<u8>, &Dictionary>,
        words: &mut WordBuilder,
        break_before: bool,
    ) {
        let Object::String(bytes, _) = obj else {
            return;
        };
        let text = decode(bytes, doc, fonts, &self.font);
        let size = self.rendered_size();
        let (x0, y) = self.position();
        self.advance(
            self.metrics
                .advance(bytes, self.font_size, self.char_spacing, self.word_spacing),
        );
        let (x1, _) = self.position();

        if self.in_text {
            words.push(&text, x0, x1, y, size, break_before);
        }
    }
}

/// Word being assembled from consecutive fragments.
struct Pending {
    text: String,
    size: f32,
    x0: f32,
    x1: f32,
    y: f32,
}

impl Pending {
    /// Gap between x-intervals is zero when they touch or overlap.
    fn continues_at(&self, x0: f32, x1: f32, y: f32) -> bool {
        let gap = (self.x0.max(x0) - self.x1.min(x1)).max(0.0);
        gap <= X_TOLERANCE && (y - self.y).abs() <= Y_TOLERANCE
    }
}

#[derive(Default)]
struct WordBuilder {
    words: Vec<Word>,
    pending: Option<Pending>,
}

impl WordBuilder {
    /// Add a shown fragment spanning `x0..x1` on baseline `y`. Characters are
    /// spread evenly across the span; whitespace always ends a word.
    fn push(&mut self, text: &str, x0: f32, x1: f32, y: f32, size: f32, break_before: bool) {
        let count = text.chars().count().max(1) as f32;
        let step = (x1 - x0) / count;

        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                self.flush();
                continue;
            }
            let cx0 = x0 + step * i as f32;
            let cx1 = cx0 + step;
            if i == 0
                && (break_before
                    || !self
                        .pending
                        .as_ref()
                        .is_some_and(|p| p.continues_at(cx0, cx1, y)))
            {
                self.flush();
            }
            match &mut self.pending {
                Some(p) => {
                    p.text.push(c);
                    p.size = p.size.max(size);
                    p.x1 = p.x1.max(cx1);
                }
                None => {
                    self.pending = Some(Pending {
                        text: c.to_string(),
                        size,
                        x0: cx0,
                        x1: cx1,
                        y,
                    })
                }
            }
        }
    }

    fn flush(&mut self) {
        if let Some(p) = self.pending.take() {
            self.words.push(Word {
                text: p.text,
                size: (p.size > 0.0).then_some(p.size),
                x: p.x0,
                y: p.y,
            });
        }
    }

    fn finish(mut self) -> Vec<Word> {
        self.flush();
        self.words
    }
}

/// Multiply two 2D transformation matrices in `[a, b, c, d, e, f]` form
fn multiply(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn matrix(operands: &[Object]) -> Option<[f32; 6]> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(m)
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode string bytes with the current font's encoding, falling back to UTF-16BE / Latin-1.
fn decode(
    bytes: &[u8],
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    font: &[u8],
) -> String {
    if let Some(font_dict) = fonts.get(font) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return text;
            }
        }
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    bytes.iter().map(|&b| b as char).collect()
}
