//! Exports rich (HTML) or plain documents as PDF, legacy Word `.doc`, or text.

pub mod style;

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context as _;

use crate::cli::{ExportArgs, ExportFormat};
use crate::html::{self, Node};

pub use style::inline_computed_styles;

pub const EXPORT_CSS: &str = "body { font-family: Arial, sans-serif; font-size: 12pt; margin: 20mm; line-height: 1.5; } p { margin: 0 0 6pt 0; }";
const DEFAULT_PDF_ENGINES: [&str; 2] = ["weasyprint", "tectonic"];

/// How to drive pandoc for PDF output.
#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub pandoc: String,
    pub pdf_engine: Option<String>,
    pub title: Option<String>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            pandoc: "pandoc".to_owned(),
            pdf_engine: None,
            title: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written(PathBuf),
    /// No PDF renderer worked; a print-ready HTML document was written instead.
    PrintFallback(PathBuf),
}

/// Plain text with paragraph, list and rule structure kept as line breaks.
pub fn html_to_text(html: &str) -> String {
    let nodes = html::parse_fragment(html);
    let mut raw = String::new();
    for node in &nodes {
        walk_text(node, &mut raw);
    }
    collapse_blank_lines(&raw).trim().to_owned()
}

fn walk_text(node: &Node, out: &mut String) {
    let el = match node {
        Node::Text(text) => {
            out.push_str(text);
            return;
        }
        Node::Element(el) => el,
    };
    let mut children = String::new();
    for child in &el.children {
        walk_text(child, &mut children);
    }
    match el.tag.as_str() {
        "br" => out.push('\n'),
        "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            out.push_str(&children);
            out.push_str("\n\n");
        }
        "li" => {
            out.push_str("• ");
            out.push_str(&children);
            out.push('\n');
        }
        "ul" | "ol" => {
            out.push_str(&children);
            out.push('\n');
        }
        "hr" => out.push_str("\n---\n\n"),
        _ => out.push_str(&children),
    }
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(ch);
    }
    out
}

/// Standalone document handed to the PDF renderer (or printed by hand).
pub fn print_document(rendered: &str) -> String {
    format!(
        "<html><head><meta charset=\"utf-8\"><title>Export PDF</title><style>@media print {{ @page {{ margin: 20mm; }} }} {EXPORT_CSS}</style></head><body>{rendered}</body></html>"
    )
}

/// Word-compatible HTML with a UTF-8 byte-order mark.
pub fn doc_document(rendered: &str) -> String {
    format!(
        "\u{feff}<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" xmlns:w=\"urn:schemas-microsoft-com:office:word\" xmlns=\"http://www.w3.org/TR/REC-html40\"><head><meta charset=\"utf-8\"><style>{EXPORT_CSS}</style></head><body>{rendered}</body></html>"
    )
}

/// One paragraph per line; blank lines keep their height.
pub fn plain_text_paragraphs(text: &str) -> String {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| {
            if line.is_empty() {
                "<p>&nbsp;</p>".to_owned()
            } else {
                format!("<p>{}</p>", html::escape_text(line))
            }
        })
        .collect()
}

pub fn export_html(
    html: &str,
    format: ExportFormat,
    out: &Path,
    pdf: &PdfOptions,
) -> anyhow::Result<ExportOutcome> {
    match format {
        ExportFormat::Txt => write_file(out, html_to_text(html).as_bytes()),
        ExportFormat::Doc => {
            let rendered = inline_computed_styles(html);
            write_file(out, doc_document(&rendered).as_bytes())
        }
        ExportFormat::Pdf => {
            let rendered = inline_computed_styles(html);
            export_pdf(&print_document(&rendered), out, pdf)
        }
    }
}

pub fn export_plain(
    text: &str,
    format: ExportFormat,
    out: &Path,
    pdf: &PdfOptions,
) -> anyhow::Result<ExportOutcome> {
    match format {
        ExportFormat::Txt => write_file(out, text.as_bytes()),
        ExportFormat::Doc => write_file(out, doc_document(&plain_text_paragraphs(text)).as_bytes()),
        ExportFormat::Pdf => export_pdf(&print_document(&plain_text_paragraphs(text)), out, pdf),
    }
}

fn write_file(out: &Path, contents: &[u8]) -> anyhow::Result<ExportOutcome> {
    std::fs::write(out, contents).with_context(|| format!("write {}", out.display()))?;
    Ok(ExportOutcome::Written(out.to_path_buf()))
}

fn export_pdf(document: &str, out: &Path, options: &PdfOptions) -> anyhow::Result<ExportOutcome> {
    let source = tempfile::Builder::new()
        .prefix("govdoc-export-")
        .suffix(".html")
        .tempfile()
        .context("create temporary print document")?;
    std::fs::write(source.path(), document).context("write temporary print document")?;

    match render_pdf_via_pandoc(source.path(), out, options) {
        Ok(()) => Ok(ExportOutcome::Written(out.to_path_buf())),
        Err(err) => {
            let fallback = print_fallback_path(out);
            tracing::warn!(
                error = %format!("{err:#}"),
                fallback = %fallback.display(),
                "pdf rendering failed; writing print-ready html instead"
            );
            std::fs::write(&fallback, document)
                .with_context(|| format!("write {}", fallback.display()))?;
            Ok(ExportOutcome::PrintFallback(fallback))
        }
    }
}

/// `report.pdf` → `report.print.html`, next to the requested output.
pub fn print_fallback_path(out: &Path) -> PathBuf {
    let stem = out
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("export");
    out.with_file_name(format!("{stem}.print.html"))
}

fn render_pdf_via_pandoc(source: &Path, out: &Path, options: &PdfOptions) -> anyhow::Result<()> {
    let engines = match options.pdf_engine.as_deref() {
        Some(engine) => vec![engine],
        None => DEFAULT_PDF_ENGINES.to_vec(),
    };

    let mut last_failure: Option<anyhow::Error> = None;
    for engine in engines {
        tracing::info!(
            format = "pdf",
            pdf_engine = engine,
            pandoc = %options.pandoc,
            out = %out.display(),
            "export via pandoc"
        );

        let pandoc_args = build_pandoc_args(source, out, engine, options.title.as_deref());
        let output = match Command::new(&options.pandoc).args(&pandoc_args).output() {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                anyhow::bail!("pandoc is not installed: {}", options.pandoc);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("run pandoc: {}", options.pandoc));
            }
        };
        if output.status.success() {
            return Ok(());
        }

        last_failure = Some(anyhow::anyhow!(
            "pandoc failed with pdf_engine={engine} ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    match last_failure {
        Some(err) => Err(err),
        None => anyhow::bail!("export pdf failed: no pdf engine candidates"),
    }
}

fn build_pandoc_args(source: &Path, out: &Path, engine: &str, title: Option<&str>) -> Vec<OsString> {
    let mut pandoc_args = vec![
        source.as_os_str().to_owned(),
        OsString::from("-o"),
        out.as_os_str().to_owned(),
        OsString::from("--from"),
        OsString::from("html"),
        OsString::from("--pdf-engine"),
        OsString::from(engine),
    ];
    let title = title.unwrap_or("Export PDF");
    pandoc_args.push(OsString::from("--metadata"));
    pandoc_args.push(OsString::from(format!("pagetitle={title}")));
    pandoc_args
}

pub fn run(args: ExportArgs) -> anyhow::Result<()> {
    crate::output::prepare_output(&args.out, args.force)?;
    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("read input: {}", args.input))?;
    if input.trim().is_empty() {
        anyhow::bail!("nothing to export: {} is empty", args.input);
    }

    let pdf = PdfOptions {
        pandoc: args.pandoc.clone(),
        pdf_engine: args.pdf_engine.clone(),
        title: args.title.clone(),
    };
    let out = Path::new(&args.out);
    let outcome = if args.plain {
        export_plain(&input, args.format, out, &pdf)?
    } else {
        export_html(&input, args.format, out, &pdf)?
    };
    report(&outcome, args.lang);
    Ok(())
}

/// Prints where the export landed.
pub fn report(outcome: &ExportOutcome, locale: crate::locale::Locale) {
    use crate::locale::tr;
    match outcome {
        ExportOutcome::Written(path) => {
            tracing::info!(out = %path.display(), "exported");
            println!("{} {}", tr(locale, "common.exported"), path.display());
        }
        ExportOutcome::PrintFallback(path) => {
            println!("{} {}", tr(locale, "translation.print_fallback"), path.display());
        }
    }
}
