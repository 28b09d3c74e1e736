//! Imported documents: format detection, extraction and sanitizing.

pub mod cmap;
pub mod docx;
pub mod pdf;
pub mod sanitize;

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cli::ImportArgs;
use crate::error::{PortalError, PortalResult};
use crate::html::escape_text;

pub use docx::convert_docx_html;
pub use pdf::extract_pdf_html;
pub use sanitize::sanitize_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Doc,
    Plaintext,
    Markup,
}

impl SourceFormat {
    /// Chosen by file extension; anything unrecognised is read as plain text.
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "doc" => Self::Doc,
            "html" | "htm" => Self::Markup,
            _ => Self::Plaintext,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedDocument {
    pub source_file_name: String,
    pub source_format: SourceFormat,
    /// Already sanitized.
    pub html: String,
}

pub fn import_bytes(file_name: &str, bytes: &[u8]) -> PortalResult<ImportedDocument> {
    let source_format = SourceFormat::from_file_name(file_name);
    let html = match source_format {
        SourceFormat::Pdf => extract_pdf_html(bytes)?,
        SourceFormat::Docx | SourceFormat::Doc => convert_docx_html(bytes)?,
        SourceFormat::Markup => String::from_utf8_lossy(bytes).into_owned(),
        SourceFormat::Plaintext => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                PortalError::UnsupportedFormat(format!("{file_name} is not UTF-8 text"))
            })?;
            format!(
                "<pre style=\"white-space:pre-wrap;word-break:break-word\">{}</pre>",
                escape_text(text)
            )
        }
    };

    Ok(ImportedDocument {
        source_file_name: file_name.to_owned(),
        source_format,
        html: sanitize_html(&html),
    })
}

pub fn import_file(path: &Path) -> anyhow::Result<ImportedDocument> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let doc = import_bytes(file_name, &bytes)
        .with_context(|| format!("import {}", path.display()))?;
    tracing::info!(
        file = %path.display(),
        format = ?doc.source_format,
        html_bytes = doc.html.len(),
        "imported document"
    );
    Ok(doc)
}

pub fn run(args: ImportArgs) -> anyhow::Result<()> {
    let doc = import_file(Path::new(&args.input))?;
    crate::output::write_text(args.out.as_deref(), &doc.html, args.force)
}
