use std::collections::HashMap;
use std::io::{Cursor, Read as _};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{PortalError, PortalResult};
use crate::html::escape_text;

const DOCX_ONLY: &str = "Could not read this Word file. Only .docx format is supported.";
const MIN_PRINTABLE_RATIO: f64 = 0.85;

/// Converts a word-processor document to HTML using paragraph style names.
///
/// Falls back to the raw bytes as preformatted text when the archive cannot be read (for
/// example a plain-text file saved with a `.doc` name); binary input is rejected.
pub fn convert_docx_html(bytes: &[u8]) -> PortalResult<String> {
    match convert_archive(bytes) {
        Ok(html) if !html.trim().is_empty() => return Ok(html),
        Ok(_) => tracing::warn!("word document produced no content; trying plain text"),
        Err(err) => tracing::warn!(%err, "word document conversion failed; trying plain text"),
    }
    plain_text_fallback(bytes)
}

fn convert_archive(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let document = read_zip_entry(&mut archive, "word/document.xml")?;
    let styles = match read_zip_entry(&mut archive, "word/styles.xml") {
        Ok(xml) => parse_style_names(&xml)?,
        Err(_) => HashMap::new(),
    };
    parse_document_xml(&document, &styles)
}

fn read_zip_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> anyhow::Result<String> {
    let mut entry = archive.by_name(name)?;
    let mut buffer = Vec::new();
    entry.read_to_end(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn plain_text_fallback(bytes: &[u8]) -> PortalResult<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() || printable_ratio(trimmed) < MIN_PRINTABLE_RATIO {
        return Err(PortalError::UnsupportedFormat(DOCX_ONLY.to_owned()));
    }
    Ok(format!("<pre>{}</pre>", escape_text(trimmed)))
}

fn printable_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut printable = 0usize;
    for ch in text.chars() {
        total += 1;
        if ch == '\n' || ch == '\r' || ch == '\t' || (!ch.is_control() && ch != '\u{fffd}') {
            printable += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    printable as f64 / total as f64
}

/// styleId → display name from `word/styles.xml`.
fn parse_style_names(xml: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut names = HashMap::new();
    let mut current_id: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"style" => current_id = attr_value(&e, b"styleId"),
                b"name" => {
                    if let (Some(id), Some(name)) = (current_id.as_ref(), attr_value(&e, b"val")) {
                        names.insert(id.clone(), name);
                    }
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"style" => current_id = None,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}

fn attr_value(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// `<w:b/>` is on; `<w:b w:val="0"/>` (or false/none) is off.
fn toggle_on(element: &BytesStart<'_>) -> bool {
    !matches!(
        attr_value(element, b"val").as_deref(),
        Some("0" | "false" | "none")
    )
}

/// Block tag for a paragraph style name, compared case- and space-insensitively.
pub fn block_tag_for_style(style_name: &str) -> &'static str {
    let normalized: String = style_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    match normalized.as_str() {
        "heading1" | "title" => "h1",
        "heading2" | "subtitle" => "h2",
        "heading3" => "h3",
        "heading4" => "h4",
        "heading5" => "h5",
        "heading6" => "h6",
        "listparagraph" => "li",
        _ => "p",
    }
}

#[derive(Debug)]
enum Block {
    Para { tag: &'static str, html: String },
    Raw(String),
}

fn join_blocks(blocks: Vec<Block>) -> String {
    let mut out = String::new();
    let mut in_list = false;
    for block in blocks {
        match block {
            Block::Para { tag: "li", html } => {
                if !in_list {
                    out.push_str("<ul>");
                    in_list = true;
                }
                out.push_str(&format!("<li>{html}</li>"));
            }
            other => {
                if in_list {
                    out.push_str("</ul>");
                    in_list = false;
                }
                match other {
                    Block::Para { tag, html } => out.push_str(&format!("<{tag}>{html}</{tag}>")),
                    Block::Raw(html) => out.push_str(&html),
                }
            }
        }
    }
    if in_list {
        out.push_str("</ul>");
    }
    out
}

#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<Block>,
}

impl TableBuilder {
    fn render(self) -> String {
        let mut out = String::from("<table>");
        for row in self.rows {
            out.push_str("<tr>");
            for cell in row {
                out.push_str(&format!("<td>{cell}</td>"));
            }
            out.push_str("</tr>");
        }
        out.push_str("</table>");
        out
    }
}

#[derive(Debug, Default)]
struct RunFormat {
    bold: bool,
    italic: bool,
    underline: bool,
}

#[derive(Debug, Default)]
struct DocumentBuilder<'s> {
    styles: Option<&'s HashMap<String, String>>,
    blocks: Vec<Block>,
    tables: Vec<TableBuilder>,
    in_paragraph: bool,
    paragraph_style: Option<String>,
    numbered: bool,
    paragraph_html: String,
    in_run: bool,
    in_run_props: bool,
    in_text: bool,
    format: RunFormat,
    run_html: String,
}

impl DocumentBuilder<'_> {
    fn open(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"p" => {
                self.in_paragraph = true;
                self.paragraph_style = None;
                self.numbered = false;
                self.paragraph_html.clear();
            }
            b"pStyle" if self.in_paragraph => self.paragraph_style = attr_value(e, b"val"),
            b"numPr" if self.in_paragraph && !self.in_run => self.numbered = true,
            b"r" => {
                self.in_run = true;
                self.format = RunFormat::default();
                self.run_html.clear();
            }
            b"rPr" if self.in_run => self.in_run_props = true,
            b"b" if self.in_run_props => self.format.bold = toggle_on(e),
            b"i" if self.in_run_props => self.format.italic = toggle_on(e),
            b"u" if self.in_run_props => self.format.underline = toggle_on(e),
            b"t" if self.in_run => self.in_text = true,
            b"tab" if self.in_run => self.run_html.push('\t'),
            b"br" | b"cr" if self.in_run => self.run_html.push_str("<br />"),
            b"tbl" => self.tables.push(TableBuilder::default()),
            b"tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.row.clear();
                }
            }
            b"tc" => {
                if let Some(table) = self.tables.last_mut() {
                    table.cell.clear();
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, local: &[u8]) {
        match local {
            b"t" => self.in_text = false,
            b"rPr" => self.in_run_props = false,
            b"r" if self.in_run => {
                self.in_run = false;
                let html = std::mem::take(&mut self.run_html);
                self.paragraph_html.push_str(&self.wrap_run(html));
            }
            b"p" if self.in_paragraph => {
                self.in_paragraph = false;
                let html = std::mem::take(&mut self.paragraph_html);
                if html.trim().is_empty() {
                    return;
                }
                let tag = if self.numbered {
                    "li"
                } else {
                    self.paragraph_tag()
                };
                self.push_block(Block::Para { tag, html });
            }
            b"tc" => {
                if let Some(table) = self.tables.last_mut() {
                    let cell = join_blocks(std::mem::take(&mut table.cell));
                    table.row.push(cell);
                }
            }
            b"tr" => {
                if let Some(table) = self.tables.last_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            b"tbl" => {
                if let Some(table) = self.tables.pop() {
                    self.push_block(Block::Raw(table.render()));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            self.run_html.push_str(&escape_text(text));
        }
    }

    fn push_block(&mut self, block: Block) {
        match self.tables.last_mut() {
            Some(table) => table.cell.push(block),
            None => self.blocks.push(block),
        }
    }

    fn paragraph_tag(&self) -> &'static str {
        let Some(style_id) = self.paragraph_style.as_deref() else {
            return "p";
        };
        let name = self
            .styles
            .and_then(|styles| styles.get(style_id))
            .map(String::as_str)
            .unwrap_or(style_id);
        block_tag_for_style(name)
    }

    fn wrap_run(&self, mut html: String) -> String {
        if html.is_empty() {
            return html;
        }
        if self.format.underline {
            html = format!("<u>{html}</u>");
        }
        if self.format.italic {
            html = format!("<i>{html}</i>");
        }
        if self.format.bold {
            html = format!("<b>{html}</b>");
        }
        html
    }
}

fn parse_document_xml(xml: &str, styles: &HashMap<String, String>) -> anyhow::Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut builder = DocumentBuilder {
        styles: Some(styles),
        ..DocumentBuilder::default()
    };

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => builder.open(&e),
            Event::Empty(e) => {
                builder.open(&e);
                builder.close(e.local_name().as_ref());
            }
            Event::End(e) => builder.close(e.local_name().as_ref()),
            Event::Text(e) => builder.text(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(join_blocks(builder.blocks))
}
