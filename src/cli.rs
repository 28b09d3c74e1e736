use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::locale::Locale;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract a PDF/DOCX/text file into sanitized HTML.
    Import(ImportArgs),
    /// Translate an HTML or text file, keeping its markup.
    Translate(TranslateArgs),
    /// Render HTML (or plain text) as PDF, Word `.doc` or text.
    Export(ExportArgs),
    /// Import, translate and export a document in one step.
    Pipeline(PipelineArgs),
    /// Apply an editor formatting command to a text range.
    Edit(EditArgs),
    Letters {
        #[command(subcommand)]
        command: LettersCommand,
    },
    Terms {
        #[command(subcommand)]
        command: TermsCommand,
    },
    Quiz {
        #[command(subcommand)]
        command: QuizCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum LettersCommand {
    List(LettersListArgs),
    Render(LettersRenderArgs),
}

#[derive(Debug, Subcommand)]
pub enum TermsCommand {
    List(TermsListArgs),
    Export(TermsExportArgs),
}

#[derive(Debug, Subcommand)]
pub enum QuizCommand {
    Run(QuizRunArgs),
    History(QuizHistoryArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// Echo the input (no translation).
    Noop,
    /// OpenAI-compatible gateway (`GOVDOC_GATEWAY_*`).
    Gateway,
    /// Hosted functions (`--functions-url` / `GOVDOC_FUNCTIONS_URL`).
    Functions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuizEngine {
    /// Build questions from the terms without a model.
    Local,
    Gateway,
    Functions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Pdf,
    Doc,
    Txt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EditOp {
    Bold,
    Italic,
    Underline,
    AlignLeft,
    AlignCenter,
    AlignRight,
    SizeSmall,
    SizeNormal,
    SizeLarge,
    SizeHuge,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Input file (.pdf, .docx, .doc, .html, or text).
    #[arg(long)]
    pub input: String,

    /// Output HTML file (defaults to stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct TranslateArgs {
    /// Input HTML or text file.
    #[arg(long)]
    pub input: String,

    /// Output file (defaults to stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Source language code, or `auto`.
    #[arg(long, default_value = "auto")]
    pub from: String,

    /// Target language code.
    #[arg(long)]
    pub to: String,

    /// Translation backend.
    #[arg(long, value_enum, default_value_t = Engine::Gateway)]
    pub engine: Engine,

    /// Base URL of the hosted functions (overrides `GOVDOC_FUNCTIONS_URL`).
    #[arg(long)]
    pub functions_url: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Input HTML file (or text with `--plain`).
    #[arg(long)]
    pub input: String,

    /// Output file.
    #[arg(long)]
    pub out: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
    pub format: ExportFormat,

    /// Treat the input as plain text instead of HTML.
    #[arg(long, default_value_t = false)]
    pub plain: bool,

    /// Pandoc executable used for PDF output.
    #[arg(long, default_value = "pandoc")]
    pub pandoc: String,

    /// Pandoc PDF engine (default: try weasyprint, then tectonic).
    #[arg(long)]
    pub pdf_engine: Option<String>,

    /// Document title for PDF metadata.
    #[arg(long)]
    pub title: Option<String>,

    /// Interface language for messages.
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub lang: Locale,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// Input document (.pdf, .docx, .html, or text).
    #[arg(long)]
    pub input: String,

    /// Output file for the translated document.
    #[arg(long)]
    pub out: String,

    /// Also write the imported source HTML here.
    #[arg(long)]
    pub source_html: Option<String>,

    /// Source language code, or `auto`.
    #[arg(long, default_value = "auto")]
    pub from: String,

    /// Target language code.
    #[arg(long)]
    pub to: String,

    /// Translation backend.
    #[arg(long, value_enum, default_value_t = Engine::Gateway)]
    pub engine: Engine,

    /// Base URL of the hosted functions (overrides `GOVDOC_FUNCTIONS_URL`).
    #[arg(long)]
    pub functions_url: Option<String>,

    /// Treat the input as plain text instead of importing it as a document.
    #[arg(long, default_value_t = false)]
    pub plain: bool,

    /// Swap the languages after translating and translate back into the source language.
    /// Needs an explicit `--from`.
    #[arg(long, default_value_t = false)]
    pub back_translate: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
    pub format: ExportFormat,

    /// Pandoc executable used for PDF output.
    #[arg(long, default_value = "pandoc")]
    pub pandoc: String,

    /// Pandoc PDF engine (default: try weasyprint, then tectonic).
    #[arg(long)]
    pub pdf_engine: Option<String>,

    /// Document title for PDF metadata.
    #[arg(long)]
    pub title: Option<String>,

    /// Interface language for messages.
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub lang: Locale,

    /// Overwrite output files if they exist.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Input HTML file.
    #[arg(long)]
    pub input: String,

    /// Formatting command.
    #[arg(long, value_enum)]
    pub op: EditOp,

    /// First character of the selection (text offset, default 0).
    #[arg(long)]
    pub start: Option<usize>,

    /// End of the selection, exclusive (default: end of text).
    #[arg(long)]
    pub end: Option<usize>,

    /// Output HTML file (defaults to stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct LettersListArgs {
    /// Language of the labels.
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub lang: Locale,
}

#[derive(Debug, Args)]
pub struct LettersRenderArgs {
    /// Template id (see `letters list`).
    #[arg(long)]
    pub id: String,

    /// Template language.
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub lang: Locale,

    /// Print the template text instead of editor HTML.
    #[arg(long, default_value_t = false)]
    pub plain: bool,

    /// Output file (defaults to stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct TermsListArgs {
    /// YAML/JSON file of your own terms (listed before the built-in ones).
    #[arg(long)]
    pub terms: Option<String>,

    /// Case-insensitive search over French and English terms.
    #[arg(long)]
    pub search: Option<String>,

    /// Category filter (`All` shows everything).
    #[arg(long)]
    pub category: Option<String>,

    /// Sort alphabetically by the French term.
    #[arg(long, default_value_t = false)]
    pub sort: bool,

    /// Interface language.
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub lang: Locale,
}

#[derive(Debug, Args)]
pub struct TermsExportArgs {
    /// YAML/JSON file of your own terms (listed before the built-in ones).
    #[arg(long)]
    pub terms: Option<String>,

    /// Case-insensitive search over French and English terms.
    #[arg(long)]
    pub search: Option<String>,

    /// Category filter (`All` exports everything).
    #[arg(long)]
    pub category: Option<String>,

    /// Sort alphabetically by the French term.
    #[arg(long, default_value_t = false)]
    pub sort: bool,

    /// Output file.
    #[arg(long)]
    pub out: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
    pub format: ExportFormat,

    /// Pandoc executable used for PDF output.
    #[arg(long, default_value = "pandoc")]
    pub pandoc: String,

    /// Pandoc PDF engine (default: try weasyprint, then tectonic).
    #[arg(long)]
    pub pdf_engine: Option<String>,

    /// Interface language for messages.
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub lang: Locale,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct QuizRunArgs {
    /// YAML/JSON file of your own terms (used before the built-in ones).
    #[arg(long)]
    pub terms: Option<String>,

    /// Question source.
    #[arg(long, value_enum, default_value_t = QuizEngine::Gateway)]
    pub engine: QuizEngine,

    /// Base URL of the hosted functions (overrides `GOVDOC_FUNCTIONS_URL`).
    #[arg(long)]
    pub functions_url: Option<String>,

    /// Quiz and interface language.
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub lang: Locale,

    /// Record the attempt for this user id.
    #[arg(long)]
    pub user: Option<String>,

    /// Directory holding quiz results.
    #[arg(long, default_value = ".govdoc")]
    pub store_dir: String,

    /// Seed for sampling and shuffling (random when omitted).
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct QuizHistoryArgs {
    /// User id whose attempts to list.
    #[arg(long)]
    pub user: String,

    /// Directory holding quiz results.
    #[arg(long, default_value = ".govdoc")]
    pub store_dir: String,

    /// Interface language.
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub lang: Locale,
}
