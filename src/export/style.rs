//! Resolves the effective style of every element and writes it inline, so exported files
//! look like the editor without its stylesheet.

use crate::html::{self, Element, Node};

const BASE_FONT_SIZE: f32 = 16.0;

#[derive(Debug, Clone, PartialEq)]
struct Computed {
    font_size: f32,
    weight: u16,
    italic: bool,
    /// `None` is the initial `start` value.
    align: Option<String>,
}

impl Default for Computed {
    fn default() -> Self {
        Self {
            font_size: BASE_FONT_SIZE,
            weight: 400,
            italic: false,
            align: None,
        }
    }
}

/// Rewrites `html` so every block becomes `<p style>` and every inline formatting element a
/// `<span style>`, with bold/italic/underline/alignment/size made explicit.
pub fn inline_computed_styles(html: &str) -> String {
    let nodes = html::parse_fragment(html);
    let mut out = String::new();
    for node in &nodes {
        write_inlined(node, &Computed::default(), &mut out);
    }
    out
}

fn write_inlined(node: &Node, parent: &Computed, out: &mut String) {
    let el = match node {
        Node::Text(text) => {
            out.push_str(&html::escape_text(text));
            return;
        }
        Node::Element(el) => el,
    };

    if el.tag == "br" {
        out.push_str("<br>");
        return;
    }

    let (computed, underline) = compute(el, parent);
    let mut children = String::new();
    for child in &el.children {
        write_inlined(child, &computed, &mut children);
    }

    match el.tag.as_str() {
        "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            out.push_str(&format!("<p{}>{children}</p>", style_attr(&computed, underline)));
        }
        "span" | "font" | "b" | "strong" | "i" | "em" | "u" => {
            out.push_str(&format!(
                "<span{}>{children}</span>",
                style_attr(&computed, underline)
            ));
        }
        _ => out.push_str(&children),
    }
}

fn style_attr(computed: &Computed, underline: bool) -> String {
    let mut parts = Vec::new();
    if computed.weight >= 700 {
        parts.push("font-weight:bold".to_owned());
    }
    if computed.italic {
        parts.push("font-style:italic".to_owned());
    }
    if underline {
        parts.push("text-decoration:underline".to_owned());
    }
    if let Some(align) = &computed.align {
        parts.push(format!("text-align:{align}"));
    }
    if (computed.font_size - BASE_FONT_SIZE).abs() > f32::EPSILON && computed.font_size > 0.0 {
        parts.push(format!("font-size:{}px", format_px(computed.font_size)));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" style=\"{}\"", parts.join(";"))
    }
}

fn format_px(value: f32) -> String {
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_owned()
}

/// Inherited style for `el`, plus whether the element itself is underlined.
fn compute(el: &Element, parent: &Computed) -> (Computed, bool) {
    let mut computed = parent.clone();
    let mut underline = false;

    match el.tag.as_str() {
        "b" | "strong" => computed.weight = 700,
        "i" | "em" => computed.italic = true,
        "u" => underline = true,
        "h1" => heading(&mut computed, parent, 2.0),
        "h2" => heading(&mut computed, parent, 1.5),
        "h3" => heading(&mut computed, parent, 1.17),
        "h4" => heading(&mut computed, parent, 1.0),
        "h5" => heading(&mut computed, parent, 0.83),
        "h6" => heading(&mut computed, parent, 0.67),
        "font" => {
            if let Some(size) = el.attr("size").and_then(legacy_font_size) {
                computed.font_size = size;
            }
        }
        _ => {}
    }

    if let Some(align) = el.attr("align") {
        apply_align(&mut computed, align);
    }

    if let Some(style) = el.attr("style") {
        for declaration in style.split(';') {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();
            match name.as_str() {
                "font-weight" => {
                    if let Some(weight) = font_weight(&value, parent.weight) {
                        computed.weight = weight;
                    }
                }
                "font-style" => computed.italic = value == "italic" || value == "oblique",
                "text-decoration" | "text-decoration-line" => {
                    underline = value.contains("underline");
                }
                "text-align" => apply_align(&mut computed, &value),
                "font-size" => {
                    if let Some(size) = font_size(&value, parent.font_size) {
                        computed.font_size = size;
                    }
                }
                _ => {}
            }
        }
    }

    (computed, underline)
}

fn heading(computed: &mut Computed, parent: &Computed, factor: f32) {
    computed.font_size = parent.font_size * factor;
    computed.weight = 700;
}

fn apply_align(computed: &mut Computed, value: &str) {
    match value.trim().to_ascii_lowercase().as_str() {
        "start" | "inherit" | "initial" => computed.align = None,
        v @ ("left" | "center" | "right" | "justify" | "end") => computed.align = Some(v.to_owned()),
        _ => {}
    }
}

/// `<font size="N">` in px, as browsers map it.
pub fn legacy_font_size(value: &str) -> Option<f32> {
    let value = value.trim();
    let base = 3i32;
    let size = if let Some(rel) = value.strip_prefix('+') {
        base + rel.parse::<i32>().ok()?
    } else if let Some(rel) = value.strip_prefix('-') {
        base - rel.parse::<i32>().ok()?
    } else {
        value.parse::<i32>().ok()?
    };
    Some(match size.clamp(1, 7) {
        1 => 10.0,
        2 => 13.0,
        3 => 16.0,
        4 => 18.0,
        5 => 24.0,
        6 => 32.0,
        _ => 48.0,
    })
}

fn font_weight(value: &str, parent: u16) -> Option<u16> {
    match value {
        "normal" => Some(400),
        "bold" => Some(700),
        "bolder" => Some(if parent < 600 { 700 } else { 900 }),
        "lighter" => Some(if parent > 500 { 400 } else { 100 }),
        other => other.parse::<u16>().ok(),
    }
}

fn font_size(value: &str, parent: f32) -> Option<f32> {
    let keyword = match value {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "xxx-large" => Some(48.0),
        "smaller" => Some(parent / 1.2),
        "larger" => Some(parent * 1.2),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }

    let number = |suffix: &str| -> Option<f32> {
        value.strip_suffix(suffix)?.trim().parse::<f32>().ok()
    };
    if let Some(px) = number("px") {
        Some(px)
    } else if let Some(pt) = number("pt") {
        Some(pt * 4.0 / 3.0)
    } else if let Some(rem) = number("rem") {
        Some(rem * BASE_FONT_SIZE)
    } else if let Some(em) = number("em") {
        Some(em * parent)
    } else if let Some(pct) = number("%") {
        Some(pct * parent / 100.0)
    } else {
        None
    }
}
