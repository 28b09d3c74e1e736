use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Layout properties that fight the editor's own page width. Anything else in a `style`
/// attribute (weight, slant, decoration, alignment, size, colour) survives.
const DROPPED_PROPERTIES: &[&str] = &[
    "width",
    "min-width",
    "max-width",
    "margin",
    "padding",
    "position",
    "top",
    "right",
    "bottom",
    "left",
    "float",
    "display",
    "overflow",
    "overflow-x",
    "overflow-y",
    "box-sizing",
];

static TAG_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static ATTR_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn tag_regex() -> Option<&'static Regex> {
    TAG_REGEX
        .get_or_init(|| Regex::new(r#"<[A-Za-z][^>"']*(?:(?:"[^"]*"|'[^']*')[^>"']*)*>"#).ok())
        .as_ref()
}

/// One attribute: leading whitespace, name, then an optional double-quoted, single-quoted or bare value.
fn attr_regex() -> Option<&'static Regex> {
    ATTR_REGEX
        .get_or_init(|| {
            Regex::new(
                r#"(\s+)([^\s=>/"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+)))?"#,
            )
            .ok()
        })
        .as_ref()
}

/// Removes layout CSS from every inline `style` attribute and drops attributes left empty.
///
/// Only start tags are rewritten; text content and tag structure pass through untouched.
/// Running it twice gives the same result as running it once.
pub fn sanitize_html(html: &str) -> String {
    let (Some(tag_re), Some(attr_re)) = (tag_regex(), attr_regex()) else {
        return html.to_owned();
    };

    tag_re
        .replace_all(html, |tag: &Captures<'_>| {
            let tag = &tag[0];
            let name_end = tag
                .char_indices()
                .skip(1)
                .find(|(_, c)| c.is_whitespace() || *c == '/' || *c == '>')
                .map_or(tag.len(), |(i, _)| i);
            let (name, attrs) = tag.split_at(name_end);
            let attrs = attr_re.replace_all(attrs, |attr: &Captures<'_>| rewrite_attr(attr));
            format!("{name}{attrs}")
        })
        .into_owned()
}

fn rewrite_attr(attr: &Captures<'_>) -> String {
    let original = &attr[0];
    if !attr[2].eq_ignore_ascii_case("style") {
        return original.to_owned();
    }
    let (value, quote) = match (attr.get(3), attr.get(4), attr.get(5)) {
        (Some(v), _, _) => (v.as_str(), '"'),
        (None, Some(v), _) => (v.as_str(), '\''),
        (None, None, Some(v)) => (v.as_str(), '"'),
        (None, None, None) => return String::new(),
    };

    let declarations = split_declarations(value);
    let kept: Vec<&str> = declarations
        .iter()
        .copied()
        .filter(|decl| !is_dropped(decl))
        .collect();

    if kept.is_empty() {
        return String::new();
    }
    if kept.len() == declarations.len() {
        return original.to_owned();
    }

    format!("{}style={quote}{}{quote}", &attr[1], kept.join("; "))
}

/// Splits a style value on `;` outside parentheses and quotes, so `url(data:...;base64,...)` stays whole.
fn split_declarations(value: &str) -> Vec<&str> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                declarations.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    declarations.push(&value[start..]);
    declarations
        .into_iter()
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .collect()
}

fn is_dropped(declaration: &str) -> bool {
    let property = declaration
        .split_once(':')
        .map(|(name, _)| name)
        .unwrap_or(declaration)
        .trim()
        .to_ascii_lowercase();
    DROPPED_PROPERTIES.contains(&property.as_str())
        || property.starts_with("margin-")
        || property.starts_with("padding-")
}
