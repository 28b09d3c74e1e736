//! Approximate structural HTML from a PDF text layer.
//!
//! Positions come from interpreting each page's content stream; line grouping, alignment
//! and bold/italic detection are heuristics and only aim for a plausible editable result.

use std::collections::{BTreeMap, HashMap};

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::document::cmap::{self, ToUnicode};
use crate::error::{PortalError, PortalResult};
use crate::html::escape_text;

const DEFAULT_PAGE_WIDTH: f32 = 612.0;
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;
/// `TJ` adjustments below this (thousandths of an em) are read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    /// Baseline, in PDF user space (grows upwards).
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    fn css(self) -> Option<&'static str> {
        match self {
            Self::Left => None,
            Self::Center => Some("center"),
            Self::Right => Some("right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub runs: Vec<TextRun>,
    pub alignment: Alignment,
}

/// Converts every page to a fragment of `<p>` lines; pages are separated by `<hr/>`.
pub fn extract_pdf_html(bytes: &[u8]) -> PortalResult<String> {
    let doc = Document::load_mem(bytes)
        .map_err(|err| PortalError::UnsupportedFormat(format!("unreadable PDF: {err}")))?;

    let pages = doc.get_pages();
    let mut rendered = Vec::with_capacity(pages.len());
    for (page_number, page_id) in pages {
        let page_width = page_width(&doc, page_id);
        let runs = page_runs(&doc, page_id);
        tracing::debug!(page_number, runs = runs.len(), page_width, "extracted text runs");
        let lines = group_lines(runs, page_width);
        rendered.push(render_page(&lines));
    }

    Ok(rendered.join("<hr/>"))
}

/// Buckets runs by rounded baseline; lines top-to-bottom, runs left-to-right.
pub fn group_lines(runs: Vec<TextRun>, page_width: f32) -> Vec<Line> {
    let mut buckets: BTreeMap<i64, Vec<TextRun>> = BTreeMap::new();
    for run in runs {
        // Word gaps come back from the `" "` join in `render_page`; blank runs would double
        // them and widen the line's extent.
        if run.text.trim().is_empty() {
            continue;
        }
        buckets.entry(run.y.round() as i64).or_default().push(run);
    }

    buckets
        .into_values()
        .rev()
        .map(|mut runs| {
            runs.sort_by(|a, b| a.x.total_cmp(&b.x));
            let alignment = infer_alignment(&runs, page_width);
            Line { runs, alignment }
        })
        .collect()
}

/// Centered when the line's midpoint sits within 30 units of the page centre (and the line
/// does not start at the left margin); right-aligned when it starts past mid-page.
pub fn infer_alignment(runs: &[TextRun], page_width: f32) -> Alignment {
    let (Some(first), Some(last)) = (runs.first(), runs.last()) else {
        return Alignment::Left;
    };
    let first_x = first.x;
    let last_x = last.x + last.width;
    let center = (first_x + last_x) / 2.0;

    if (center - page_width / 2.0).abs() < 30.0 && first_x > 50.0 {
        Alignment::Center
    } else if first_x > page_width * 0.5 {
        Alignment::Right
    } else {
        Alignment::Left
    }
}

pub fn render_page(lines: &[Line]) -> String {
    let mut out = String::new();
    for line in lines {
        match line.alignment.css() {
            Some(align) => out.push_str(&format!("<p style=\"text-align:{align}\">")),
            None => out.push_str("<p>"),
        }
        let runs: Vec<String> = line.runs.iter().map(render_run).collect();
        out.push_str(&runs.join(" "));
        out.push_str("</p>");
    }
    out
}

fn render_run(run: &TextRun) -> String {
    let text = escape_text(&run.text);
    let mut styles = Vec::new();
    if run.bold {
        styles.push("font-weight:bold".to_owned());
    }
    if run.italic {
        styles.push("font-style:italic".to_owned());
    }
    let size = run.font_size.round() as i64;
    if size != 0 && size != 12 && size != 16 {
        styles.push(format!("font-size:{size}px"));
    }

    if styles.is_empty() {
        text
    } else {
        format!("<span style=\"{}\">{text}</span>", styles.join(";"))
    }
}

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

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

fn translate(tx: f32, ty: f32, m: &Matrix) -> Matrix {
    multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], m)
}

#[derive(Debug, Clone)]
struct FontInfo {
    bold: bool,
    italic: bool,
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    to_unicode: Option<ToUnicode>,
}

impl FontInfo {
    fn fallback() -> Self {
        Self {
            bold: false,
            italic: false,
            two_byte: false,
            first_char: 0,
            widths: Vec::new(),
            to_unicode: None,
        }
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    fn decode(&self, code: u32) -> String {
        if let Some(mapped) = self.to_unicode.as_ref().and_then(|map| map.get(&code)) {
            return mapped.clone();
        }
        if self.two_byte {
            return char::from_u32(code).map(String::from).unwrap_or_default();
        }
        win_ansi_char(code as u8).to_string()
    }

    fn glyph_width(&self, code: u32) -> f32 {
        code.checked_sub(self.first_char)
            .and_then(|idx| self.widths.get(idx as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_GLYPH_WIDTH)
    }
}

fn win_ansi_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8d}', 'Ž',
        '\u{8f}', '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
        '\u{9d}', 'ž', 'Ÿ',
    ];
    match byte {
        0x80..=0x9F => HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

struct PageInterpreter<'a> {
    doc: &'a Document,
    fonts: HashMap<Vec<u8>, FontInfo>,
    font_dicts: Option<&'a Dictionary>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    runs: Vec<TextRun>,
}

fn page_runs(doc: &Document, page_id: ObjectId) -> Vec<TextRun> {
    let content = match doc.get_page_content(page_id) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(?page_id, %err, "skip page without readable content");
            return Vec::new();
        }
    };
    let content = match Content::decode(&content) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(?page_id, %err, "skip page with undecodable content stream");
            return Vec::new();
        }
    };

    let font_dicts = inherited(doc, page_id, b"Resources")
        .and_then(|res| res.as_dict().ok())
        .and_then(|res| res.get(b"Font").ok())
        .and_then(|font| resolve(doc, font).as_dict().ok());

    let mut interpreter = PageInterpreter {
        doc,
        fonts: HashMap::new(),
        font_dicts,
        state: GraphicsState::default(),
        stack: Vec::new(),
        tm: IDENTITY,
        tlm: IDENTITY,
        runs: Vec::new(),
    };
    for op in &content.operations {
        interpreter.apply(&op.operator, &op.operands);
    }
    interpreter.runs
}

impl PageInterpreter<'_> {
    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let num = |idx: usize| operands.get(idx).and_then(number).unwrap_or(0.0);
        match operator {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                let m = [num(0), num(1), num(2), num(3), num(4), num(5)];
                self.state.ctm = multiply(&m, &self.state.ctm);
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.state.font = Some(name.clone());
                }
                self.state.font_size = num(1);
            }
            "Tc" => self.state.char_spacing = num(0),
            "Tw" => self.state.word_spacing = num(0),
            "Tz" => self.state.horizontal_scale = num(0) / 100.0,
            "TL" => self.state.leading = num(0),
            "Td" => self.move_line(num(0), num(1)),
            "TD" => {
                self.state.leading = -num(1);
                self.move_line(num(0), num(1));
            }
            "Tm" => {
                self.tlm = [num(0), num(1), num(2), num(3), num(4), num(5)];
                self.tm = self.tlm;
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&[TextPiece::Bytes(bytes)]);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&[TextPiece::Bytes(bytes)]);
                }
            }
            "\"" => {
                self.state.word_spacing = num(0);
                self.state.char_spacing = num(1);
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(&[TextPiece::Bytes(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let pieces: Vec<TextPiece<'_>> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(TextPiece::Bytes(bytes)),
                            other => number(other).map(TextPiece::Adjust),
                        })
                        .collect();
                    self.show(&pieces);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = translate(tx, ty, &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn show(&mut self, pieces: &[TextPiece<'_>]) {
        let font = self.current_font();
        let size = self.state.font_size;
        let scale = self.state.horizontal_scale;
        let start = multiply(&self.tm, &self.state.ctm);

        let mut text = String::new();
        let mut advance = 0.0f32;
        for piece in pieces {
            match piece {
                TextPiece::Bytes(bytes) => {
                    for code in font.codes(bytes) {
                        text.push_str(&font.decode(code));
                        let mut w = font.glyph_width(code) / 1000.0 * size + self.state.char_spacing;
                        if code == 32 && !font.two_byte {
                            w += self.state.word_spacing;
                        }
                        advance += w * scale;
                    }
                }
                TextPiece::Adjust(amount) => {
                    if *amount < TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    advance -= amount / 1000.0 * size * scale;
                }
            }
        }

        self.tm = translate(advance, 0.0, &self.tm);

        if text.is_empty() {
            return;
        }
        self.runs.push(TextRun {
            text,
            x: start[4],
            y: start[5],
            width: advance * start[0],
            font_size: (size * start[0]).abs().round(),
            bold: font.bold,
            italic: font.italic,
        });
    }

    fn current_font(&mut self) -> FontInfo {
        let Some(name) = self.state.font.clone() else {
            return FontInfo::fallback();
        };
        if let Some(font) = self.fonts.get(&name) {
            return font.clone();
        }
        let font = self
            .font_dicts
            .and_then(|fonts| fonts.get(&name).ok())
            .and_then(|font| resolve(self.doc, font).as_dict().ok())
            .map(|dict| load_font(self.doc, dict))
            .unwrap_or_else(FontInfo::fallback);
        self.fonts.insert(name, font.clone());
        font
    }
}

enum TextPiece<'a> {
    Bytes(&'a [u8]),
    Adjust(f32),
}

fn load_font(doc: &Document, dict: &Dictionary) -> FontInfo {
    let base_name = dict
        .get(b"BaseFont")
        .ok()
        .and_then(|name| match resolve(doc, name) {
            Object::Name(name) => Some(String::from_utf8_lossy(name).to_lowercase()),
            _ => None,
        })
        .unwrap_or_default();
    let two_byte = matches!(dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Type0");

    let first_char = dict
        .get(b"FirstChar")
        .ok()
        .and_then(|v| number(resolve(doc, v)))
        .unwrap_or(0.0) as u32;
    let widths = dict
        .get(b"Widths")
        .ok()
        .and_then(|v| match resolve(doc, v) {
            Object::Array(items) => Some(
                items
                    .iter()
                    .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default();

    let to_unicode = dict
        .get(b"ToUnicode")
        .ok()
        .and_then(|v| match resolve(doc, v) {
            Object::Stream(stream) => Some(
                stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone()),
            ),
            _ => None,
        })
        .map(|data| cmap::parse_to_unicode(&data))
        .filter(|map| !map.is_empty());

    FontInfo {
        bold: base_name.contains("bold") || base_name.contains("black"),
        italic: base_name.contains("italic") || base_name.contains("oblique"),
        two_byte,
        first_char,
        widths,
        to_unicode,
    }
}

fn page_width(doc: &Document, page_id: ObjectId) -> f32 {
    let Some(Object::Array(bounds)) = inherited(doc, page_id, b"MediaBox") else {
        return DEFAULT_PAGE_WIDTH;
    };
    let values: Vec<f32> = bounds
        .iter()
        .filter_map(|v| number(resolve(doc, v)))
        .collect();
    match values.as_slice() {
        [x0, _, x1, _] if x1 > x0 => x1 - x0,
        _ => DEFAULT_PAGE_WIDTH,
    }
}

/// Looks up a page attribute, following `Parent` for inheritable entries.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Guards against cyclic Parent chains.
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = match current.get(b"Parent").ok()? {
            Object::Reference(id) => *id,
            _ => return None,
        };
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f32, y: f32, width: f32) -> TextRun {
        TextRun {
            text: text.to_owned(),
            x,
            y,
            width,
            font_size: 12.0,
            bold: false,
            italic: false,
        }
    }

    #[test]
    fn lines_are_ordered_top_to_bottom_and_left_to_right() {
        let runs = vec![
            run("second", 72.0, 600.0, 40.0),
            run("world", 120.0, 700.2, 30.0),
            run("Hello", 72.0, 699.8, 30.0),
        ];
        let lines = group_lines(runs, 600.0);
        assert_eq!(lines.len(), 2);
        let first: Vec<&str> = lines[0].runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(first, ["Hello", "world"]);
        assert_eq!(lines[1].runs[0].text, "second");
    }

    #[test]
    fn blank_runs_neither_double_gaps_nor_shift_alignment() {
        let runs = vec![
            run(" ", 10.0, 700.0, 3.0),
            run("Bonjour", 250.0, 700.0, 40.0),
            run(" ", 290.0, 700.0, 3.0),
            run("Madame", 293.0, 700.0, 57.0),
        ];
        let lines = group_lines(runs, 600.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].alignment, Alignment::Center);
        assert_eq!(
            render_page(&lines),
            r#"<p style="text-align:center">Bonjour Madame</p>"#
        );
    }

    #[test]
    fn alignment_heuristic_on_a_600_wide_page() {
        assert_eq!(
            infer_alignment(&[run("t", 250.0, 0.0, 100.0)], 600.0),
            Alignment::Center
        );
        assert_eq!(
            infer_alignment(&[run("t", 350.0, 0.0, 100.0)], 600.0),
            Alignment::Right
        );
        assert_eq!(
            infer_alignment(&[run("t", 40.0, 0.0, 100.0)], 600.0),
            Alignment::Left
        );
    }

    #[test]
    fn render_page_marks_styles_and_alignment() {
        let mut bold = run("Title & co", 250.0, 700.0, 100.0);
        bold.bold = true;
        bold.font_size = 18.0;
        let lines = vec![
            Line {
                runs: vec![bold],
                alignment: Alignment::Center,
            },
            Line {
                runs: vec![run("a", 72.0, 600.0, 5.0), run("b", 80.0, 600.0, 5.0)],
                alignment: Alignment::Left,
            },
        ];
        assert_eq!(
            render_page(&lines),
            "<p style=\"text-align:center\"><span style=\"font-weight:bold;font-size:18px\">Title &amp; co</span></p><p>a b</p>"
        );
    }

    #[test]
    fn default_sizes_are_not_emitted() {
        let mut r = run("x", 0.0, 0.0, 1.0);
        r.font_size = 16.0;
        assert_eq!(render_run(&r), "x");
        r.font_size = 0.0;
        assert_eq!(render_run(&r), "x");
    }

    #[test]
    fn win_ansi_maps_high_range() {
        assert_eq!(win_ansi_char(0x80), '€');
        assert_eq!(win_ansi_char(0xE9), 'é');
        assert_eq!(win_ansi_char(b'A'), 'A');
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        assert!(matches!(
            extract_pdf_html(b"not a pdf"),
            Err(PortalError::UnsupportedFormat(_))
        ));
    }
}
