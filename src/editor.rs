//! Editable rich document: an HTML value plus selection-based formatting.
//!
//! Data flows one way. Every edit produces a [`DocumentChange`] for the owner, and the owner
//! pushes values back through [`RichDocument::set_value`]. A pushed value equal to the last
//! one this document emitted or accepted is ignored, so an echoed edit never resets the surface.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cli::{EditArgs, EditOp};
use crate::html::{self, Element, Node};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub html: String,
}

/// Character offsets over the document's text content, `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// A caret selects the character after it, or the last one at the end of the text.
    fn around_caret(self, text_len: usize) -> Self {
        if !self.is_collapsed() || text_len == 0 {
            return self;
        }
        let at = self.start.min(text_len - 1);
        Self {
            start: at,
            end: at + 1,
        }
    }

    fn touches(&self, from: usize, to: usize) -> bool {
        if self.is_collapsed() {
            from <= self.start && self.start <= to
        } else {
            self.start < to && self.end > from
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn css(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// The four sizes offered by the toolbar, as legacy `<font size>` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    Normal,
    Large,
    Huge,
}

impl FontSize {
    pub fn html_size(self) -> u8 {
        match self {
            Self::Small => 1,
            Self::Normal => 3,
            Self::Large => 5,
            Self::Huge => 7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichDocument {
    surface: String,
    last_applied: Option<String>,
}

impl RichDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: &str) -> Self {
        let mut doc = Self::new();
        doc.set_value(value);
        doc
    }

    pub fn value(&self) -> &str {
        &self.surface
    }

    /// Applies an externally supplied value. Returns whether the surface changed.
    pub fn set_value(&mut self, value: &str) -> bool {
        if self.last_applied.as_deref() == Some(value) {
            return false;
        }
        self.last_applied = Some(value.to_owned());
        if self.surface == value {
            return false;
        }
        self.surface = value.to_owned();
        true
    }

    /// Records content typed by the user and reports it to the owner.
    pub fn user_edit(&mut self, html: &str) -> DocumentChange {
        self.surface = html.to_owned();
        self.last_applied = Some(html.to_owned());
        DocumentChange {
            html: html.to_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.surface.as_str(), "" | "<br>" | "<div><br></div>")
    }

    pub fn text_content(&self) -> String {
        html::text_content(&html::parse_fragment(&self.surface))
    }

    pub fn bold(&mut self, selection: Selection) -> DocumentChange {
        self.wrap_inline(selection, || Element::new("b"))
    }

    pub fn italic(&mut self, selection: Selection) -> DocumentChange {
        self.wrap_inline(selection, || Element::new("i"))
    }

    pub fn underline(&mut self, selection: Selection) -> DocumentChange {
        self.wrap_inline(selection, || Element::new("u"))
    }

    pub fn font_size(&mut self, selection: Selection, size: FontSize) -> DocumentChange {
        self.wrap_inline(selection, || {
            let mut font = Element::new("font");
            font.set_attr("size", size.html_size().to_string());
            font
        })
    }

    pub fn align(&mut self, selection: Selection, align: TextAlign) -> DocumentChange {
        let nodes = html::parse_fragment(&self.surface);
        let selection = selection.around_caret(nodes.iter().map(text_len).sum());
        let mut offset = 0;
        let nodes = align_blocks(nodes, selection, align, &mut offset);
        self.user_edit(&html::serialize(&nodes))
    }

    fn wrap_inline(&mut self, selection: Selection, make: impl Fn() -> Element) -> DocumentChange {
        if selection.is_collapsed() {
            return self.user_edit(&self.surface.clone());
        }
        let nodes = html::parse_fragment(&self.surface);
        let mut offset = 0;
        let nodes = wrap_text_range(nodes, selection, &make, &mut offset);
        self.user_edit(&html::serialize(&nodes))
    }
}

fn wrap_text_range(
    nodes: Vec<Node>,
    selection: Selection,
    make: &dyn Fn() -> Element,
    offset: &mut usize,
) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(text) => {
                let len = text.chars().count();
                let from = *offset;
                let to = from + len;
                *offset = to;
                if !selection.touches(from, to) {
                    out.push(Node::Text(text));
                    continue;
                }
                let cut_start = selection.start.saturating_sub(from).min(len);
                let cut_end = selection.end.saturating_sub(from).min(len);
                let before: String = text.chars().take(cut_start).collect();
                let inside: String = text.chars().skip(cut_start).take(cut_end - cut_start).collect();
                let after: String = text.chars().skip(cut_end).collect();
                if !before.is_empty() {
                    out.push(Node::Text(before));
                }
                if !inside.is_empty() {
                    let mut wrapper = make();
                    wrapper.children.push(Node::Text(inside));
                    out.push(Node::Element(wrapper));
                }
                if !after.is_empty() {
                    out.push(Node::Text(after));
                }
            }
            Node::Element(mut el) => {
                el.children = wrap_text_range(el.children, selection, make, offset);
                out.push(Node::Element(el));
            }
        }
    }
    out
}

fn text_len(node: &Node) -> usize {
    match node {
        Node::Text(text) => text.chars().count(),
        Node::Element(el) => el.children.iter().map(text_len).sum(),
    }
}

fn has_block_children(el: &Element) -> bool {
    el.children
        .iter()
        .any(|child| child.as_element().is_some_and(|c| html::is_block(&c.tag)))
}

fn align_blocks(
    nodes: Vec<Node>,
    selection: Selection,
    align: TextAlign,
    offset: &mut usize,
) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut loose: Vec<Node> = Vec::new();
    let mut loose_from = *offset;

    let flush = |loose: &mut Vec<Node>, loose_from: usize, offset: usize, out: &mut Vec<Node>| {
        if loose.is_empty() {
            return;
        }
        let run = std::mem::take(loose);
        let only_whitespace = run
            .iter()
            .all(|n| matches!(n, Node::Text(t) if t.trim().is_empty()));
        if !only_whitespace && selection.touches(loose_from, offset) {
            let mut div = Element::with_children("div", run);
            set_text_align(&mut div, align);
            out.push(Node::Element(div));
        } else {
            out.extend(run);
        }
    };

    for node in nodes {
        let is_block = node.as_element().is_some_and(|el| html::is_block(&el.tag));
        if !is_block {
            if loose.is_empty() {
                loose_from = *offset;
            }
            *offset += text_len(&node);
            loose.push(node);
            continue;
        }
        flush(&mut loose, loose_from, *offset, &mut out);

        let Node::Element(mut el) = node else {
            continue;
        };
        let from = *offset;
        if has_block_children(&el) {
            el.children = align_blocks(el.children, selection, align, offset);
        } else {
            *offset += el.children.iter().map(text_len).sum::<usize>();
            if el.tag != "hr" && selection.touches(from, *offset) {
                set_text_align(&mut el, align);
            }
        }
        out.push(Node::Element(el));
    }
    flush(&mut loose, loose_from, *offset, &mut out);
    out
}

fn set_text_align(el: &mut Element, align: TextAlign) {
    let mut declarations: Vec<String> = el
        .attr("style")
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            decl.split_once(':')
                .is_none_or(|(name, _)| !name.trim().eq_ignore_ascii_case("text-align"))
        })
        .map(str::to_owned)
        .collect();
    declarations.push(format!("text-align: {}", align.css()));
    el.set_attr("style", declarations.join("; "));
}

pub fn run(args: EditArgs) -> anyhow::Result<()> {
    let input = Path::new(&args.input);
    let html = std::fs::read_to_string(input)
        .with_context(|| format!("read {}", input.display()))?;

    let mut doc = RichDocument::with_value(&html);
    let selection = match (args.start, args.end) {
        (Some(start), Some(end)) => Selection::new(start, end),
        (Some(start), None) => Selection::new(start, doc.text_content().chars().count()),
        (None, end) => Selection::new(0, end.unwrap_or_else(|| doc.text_content().chars().count())),
    };

    let change = match args.op {
        EditOp::Bold => doc.bold(selection),
        EditOp::Italic => doc.italic(selection),
        EditOp::Underline => doc.underline(selection),
        EditOp::AlignLeft => doc.align(selection, TextAlign::Left),
        EditOp::AlignCenter => doc.align(selection, TextAlign::Center),
        EditOp::AlignRight => doc.align(selection, TextAlign::Right),
        EditOp::SizeSmall => doc.font_size(selection, FontSize::Small),
        EditOp::SizeNormal => doc.font_size(selection, FontSize::Normal),
        EditOp::SizeLarge => doc.font_size(selection, FontSize::Large),
        EditOp::SizeHuge => doc.font_size(selection, FontSize::Huge),
    };
    tracing::info!(op = ?args.op, start = selection.start, end = selection.end, "applied edit");

    crate::output::write_text(args.out.as_deref(), &change.html, args.force)
}
