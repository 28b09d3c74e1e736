//! A translation workspace: source and translated editors plus their languages.
//!
//! Each translate call overwrites the translated side with whatever resolves last; calls
//! are neither de-duplicated nor cancelled.

use std::path::Path;

use anyhow::Context as _;

use crate::cli::{ExportFormat, PipelineArgs};
use crate::document::{self, ImportedDocument};
use crate::editor::RichDocument;
use crate::error::{PortalError, PortalResult};
use crate::export::{self, ExportOutcome, PdfOptions};
use crate::translate::{self, AUTO_DETECT, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Plain text on both sides.
    Text,
    /// Formatted HTML on both sides (letters, imported documents).
    Rich,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Translated,
}

#[derive(Debug, Clone)]
pub struct DocumentSession {
    mode: SessionMode,
    source_lang: String,
    target_lang: String,
    source: RichDocument,
    translated: RichDocument,
    document: Option<ImportedDocument>,
}

impl DocumentSession {
    pub fn new(mode: SessionMode, source_lang: &str, target_lang: &str) -> Self {
        Self {
            mode,
            source_lang: source_lang.to_owned(),
            target_lang: target_lang.to_owned(),
            source: RichDocument::new(),
            translated: RichDocument::new(),
            document: None,
        }
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    pub fn source(&self) -> &str {
        self.source.value()
    }

    pub fn translated(&self) -> &str {
        self.translated.value()
    }

    /// Imports a file as the new source. Any previous translation is dropped.
    pub fn upload(&mut self, file_name: &str, bytes: &[u8]) -> PortalResult<&ImportedDocument> {
        let imported = document::import_bytes(file_name, bytes)?;
        self.remove();
        self.mode = SessionMode::Rich;
        self.source.set_value(&imported.html);
        Ok(self.document.insert(imported))
    }

    /// Replaces the source content (typed text or a rendered letter).
    pub fn set_source(&mut self, content: &str) {
        self.source.set_value(content);
    }

    /// Clears the document, both editors included.
    pub fn remove(&mut self) {
        self.document = None;
        self.source.set_value("");
        self.translated.set_value("");
    }

    pub async fn translate(&mut self, translator: &dyn Translator) -> PortalResult<&str> {
        let payload = self.source.value().to_owned();
        let translated =
            translate::translate_payload(translator, &payload, &self.source_lang, &self.target_lang)
                .await?;
        self.apply_translation(&translated);
        Ok(self.translated.value())
    }

    pub fn apply_translation(&mut self, translated: &str) {
        self.translated.set_value(translated);
    }

    /// Exchanges the languages and the contents of both sides.
    pub fn swap_languages(&mut self) -> PortalResult<()> {
        if self.source_lang == AUTO_DETECT {
            return Err(PortalError::Validation(
                "cannot swap while the source language is auto-detected".to_owned(),
            ));
        }
        std::mem::swap(&mut self.source_lang, &mut self.target_lang);
        let source = self.source.value().to_owned();
        let translated = self.translated.value().to_owned();
        self.source.set_value(&translated);
        self.translated.set_value(&source);
        Ok(())
    }

    pub fn export(
        &self,
        side: Side,
        format: ExportFormat,
        out: &Path,
        pdf: &PdfOptions,
    ) -> anyhow::Result<ExportOutcome> {
        let content = match side {
            Side::Source => self.source.value(),
            Side::Translated => self.translated.value(),
        };
        if content.trim().is_empty() {
            anyhow::bail!("nothing to export");
        }
        match self.mode {
            SessionMode::Text => export::export_plain(content, format, out, pdf),
            SessionMode::Rich => export::export_html(content, format, out, pdf),
        }
    }
}

/// Import, translate and export in one go.
pub async fn run_pipeline(args: PipelineArgs) -> anyhow::Result<()> {
    crate::output::prepare_output(&args.out, args.force)?;
    if args.back_translate && args.from == AUTO_DETECT {
        anyhow::bail!("--back-translate needs an explicit --from language");
    }
    let input = Path::new(&args.input);
    let bytes = std::fs::read(input).with_context(|| format!("read {}", input.display()))?;

    let mut session = if args.plain {
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is not UTF-8 text", input.display()))?;
        let mut session = DocumentSession::new(SessionMode::Text, &args.from, &args.to);
        session.set_source(&text);
        session
    } else {
        let file_name = input
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let mut session = DocumentSession::new(SessionMode::Rich, &args.from, &args.to);
        let imported = session
            .upload(file_name, &bytes)
            .with_context(|| format!("import {}", input.display()))?;
        tracing::info!(file = %imported.source_file_name, format = ?imported.source_format, "pipeline import");
        session
    };

    if let Some(html_out) = args.source_html.as_deref() {
        crate::output::write_text(Some(html_out), session.source(), args.force)?;
    }

    let translator = translate::translator_for(args.engine, args.functions_url.as_deref())?;
    session
        .translate(translator.as_ref())
        .await
        .context("translate")?;

    if args.back_translate {
        session.swap_languages()?;
        tracing::info!(from = session.source_lang(), to = session.target_lang(), "back-translating");
        session
            .translate(translator.as_ref())
            .await
            .context("back-translate")?;
    }

    let pdf = PdfOptions {
        pandoc: args.pandoc,
        pdf_engine: args.pdf_engine,
        title: args.title,
    };
    let outcome = session.export(Side::Translated, args.format, Path::new(&args.out), &pdf)?;
    export::report(&outcome, args.lang);
    Ok(())
}
