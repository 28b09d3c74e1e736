//! Bilingual terminology bank: built-in terms plus a user term file.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cli::{TermsExportArgs, TermsListArgs};
use crate::export::{self, PdfOptions};
use crate::html;
use crate::locale::{self, Locale};

const DEFAULT_TERMS_YAML: &str = include_str!("../assets/default_terms.yaml");

pub const CATEGORIES: [&str; 8] = [
    "All",
    "Government",
    "Legal",
    "Administration",
    "Finance",
    "Education",
    "Procurement",
    "HR",
];
pub const ALL_CATEGORIES: &str = "All";
pub const NEW_TERM_CATEGORY: &str = "General";
pub const BANK_TITLE: &str = "Terminology Bank / Banque Terminologique";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub fr: String,
    pub en: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_fr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_fr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_en: Option<String>,
}

fn default_category() -> String {
    NEW_TERM_CATEGORY.to_owned()
}

impl Term {
    pub fn new(fr: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            fr: fr.into(),
            en: en.into(),
            category: default_category(),
            definition_fr: None,
            definition_en: None,
            example_fr: None,
            example_en: None,
        }
    }

    /// The term in the given language (`fr` for French, `en` otherwise).
    pub fn in_lang(&self, lang: &str) -> &str {
        if lang == "fr" { &self.fr } else { &self.en }
    }
}

pub fn default_terms() -> Vec<Term> {
    match serde_yaml::from_str(DEFAULT_TERMS_YAML) {
        Ok(terms) => terms,
        Err(err) => {
            tracing::error!(error = %err, "embedded default terms are invalid");
            Vec::new()
        }
    }
}

/// Reads a YAML (or JSON) list of terms.
pub fn load_term_file(path: &Path) -> anyhow::Result<Vec<Term>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read term file: {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let terms: Vec<Term> = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse term file: {}", path.display()))?;
    for (index, term) in terms.iter().enumerate() {
        if term.fr.trim().is_empty() || term.en.trim().is_empty() {
            anyhow::bail!(
                "term #{} in {} needs both `fr` and `en`",
                index + 1,
                path.display()
            );
        }
    }
    Ok(terms)
}

/// Persisted terms first, then the built-in ones.
pub fn term_pool(persisted: Vec<Term>) -> Vec<Term> {
    let mut pool = persisted;
    pool.extend(default_terms());
    pool
}

pub fn load_pool(term_file: Option<&str>) -> anyhow::Result<Vec<Term>> {
    let persisted = match term_file {
        Some(path) => load_term_file(Path::new(path))?,
        None => Vec::new(),
    };
    Ok(term_pool(persisted))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFilter {
    pub search: String,
    pub category: Option<String>,
    pub sort_alpha: bool,
}

impl TermFilter {
    pub fn matches(&self, term: &Term) -> bool {
        let needle = self.search.trim().to_lowercase();
        let found = needle.is_empty()
            || term.fr.to_lowercase().contains(&needle)
            || term.en.to_lowercase().contains(&needle);
        let in_category = match self.category.as_deref() {
            None | Some(ALL_CATEGORIES) => true,
            Some(category) => term.category == category,
        };
        found && in_category
    }

    pub fn apply<'a>(&self, terms: &'a [Term]) -> Vec<&'a Term> {
        let mut out: Vec<&Term> = terms.iter().filter(|t| self.matches(t)).collect();
        if self.sort_alpha {
            out.sort_by_cached_key(|t| collation_key(&t.fr));
        }
        out
    }
}

/// Lowercased, accent-folded key so `É` sorts with `e`.
pub fn collation_key(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|ch| match ch {
            'à' | 'â' | 'ä' | 'á' | 'ã' => 'a',
            'ç' => 'c',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' | 'ì' => 'i',
            'ô' | 'ö' | 'ó' | 'ò' | 'õ' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ÿ' => 'y',
            'œ' => 'o',
            'æ' => 'a',
            other => other,
        })
        .collect()
}

/// The bank as an HTML document for the export renderer.
pub fn bank_html(terms: &[&Term]) -> String {
    let mut out = format!("<h1>{}</h1>", html::escape_text(BANK_TITLE));
    for term in terms {
        out.push_str(&format!(
            "<p><b>{}  /  {}</b><br>[{}]",
            html::escape_text(&term.fr),
            html::escape_text(&term.en),
            html::escape_text(&term.category)
        ));
        let lines = [
            ("Définition (FR): ", term.definition_fr.as_deref(), false),
            ("Definition (EN): ", term.definition_en.as_deref(), false),
            ("Ex (FR): ", term.example_fr.as_deref(), true),
            ("Ex (EN): ", term.example_en.as_deref(), true),
        ];
        for (label, value, quoted) in lines {
            let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let value = html::escape_text(value);
            if quoted {
                out.push_str(&format!("<br><i>{label}\"{value}\"</i>"));
            } else {
                out.push_str(&format!("<br>{label}{value}"));
            }
        }
        out.push_str("</p><hr>");
    }
    out
}

pub fn run_list(args: TermsListArgs) -> anyhow::Result<()> {
    let pool = load_pool(args.terms.as_deref())?;
    let filter = TermFilter {
        search: args.search.unwrap_or_default(),
        category: args.category,
        sort_alpha: args.sort,
    };
    let terms = filter.apply(&pool);
    tracing::debug!(pool = pool.len(), shown = terms.len(), "list terms");

    println!("{}", locale::tr(args.lang, "terms.header"));
    if terms.is_empty() {
        println!("{}", locale::tr(args.lang, "terms.none"));
        return Ok(());
    }
    for term in terms {
        print_term(term, args.lang);
    }
    Ok(())
}

fn print_term(term: &Term, lang: Locale) {
    println!();
    println!("{}  /  {}  [{}]", term.fr, term.en, term.category);
    let (definition, example) = match lang {
        Locale::Fr => (&term.definition_fr, &term.example_fr),
        Locale::En => (&term.definition_en, &term.example_en),
    };
    if let Some(definition) = definition {
        println!("  {}: {definition}", locale::tr(lang, "terms.definition"));
    }
    if let Some(example) = example {
        println!("  {}: \"{example}\"", locale::tr(lang, "terms.example"));
    }
}

pub fn run_export(args: TermsExportArgs) -> anyhow::Result<()> {
    crate::output::prepare_output(&args.out, args.force)?;
    let pool = load_pool(args.terms.as_deref())?;
    let filter = TermFilter {
        search: args.search.unwrap_or_default(),
        category: args.category,
        sort_alpha: args.sort,
    };
    let terms = filter.apply(&pool);
    if terms.is_empty() {
        anyhow::bail!("no terms match the given filter");
    }

    let pdf = PdfOptions {
        pandoc: args.pandoc,
        pdf_engine: args.pdf_engine,
        title: Some(BANK_TITLE.to_owned()),
    };
    let outcome = export::export_html(&bank_html(&terms), args.format, Path::new(&args.out), &pdf)?;
    export::report(&outcome, args.lang);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(fr: &str, en: &str, category: &str) -> Term {
        Term {
            category: category.to_owned(),
            ..Term::new(fr, en)
        }
    }

    #[test]
    fn default_terms_are_embedded() {
        let terms = default_terms();
        assert_eq!(terms.len(), 15);
        assert!(terms.iter().all(|t| CATEGORIES.contains(&t.category.as_str())));
    }

    #[test]
    fn pool_puts_persisted_terms_first() {
        let pool = term_pool(vec![term("Arrêté", "Order", "Legal")]);
        assert_eq!(pool[0].fr, "Arrêté");
        assert_eq!(pool.len(), 16);
    }

    #[test]
    fn search_is_case_insensitive_over_both_languages() {
        let terms = vec![
            term("Budget de l'État", "State Budget", "Finance"),
            term("Circulaire", "Circular", "Administration"),
        ];
        let filter = TermFilter {
            search: "STATE".to_owned(),
            ..TermFilter::default()
        };
        assert_eq!(filter.apply(&terms).len(), 1);
        let filter = TermFilter {
            search: "circ".to_owned(),
            category: Some("Finance".to_owned()),
            sort_alpha: false,
        };
        assert!(filter.apply(&terms).is_empty());
        let filter = TermFilter {
            category: Some(ALL_CATEGORIES.to_owned()),
            ..TermFilter::default()
        };
        assert_eq!(filter.apply(&terms).len(), 2);
    }

    #[test]
    fn alphabetical_sort_folds_accents() {
        let terms = vec![
            term("Fonction publique", "Civil Service", "Administration"),
            term("Élection", "Election", "Government"),
            term("Décret", "Decree", "Legal"),
        ];
        let filter = TermFilter {
            sort_alpha: true,
            ..TermFilter::default()
        };
        let sorted: Vec<&str> = filter.apply(&terms).iter().map(|t| t.fr.as_str()).collect();
        assert_eq!(sorted, ["Décret", "Élection", "Fonction publique"]);
    }

    #[test]
    fn term_file_accepts_yaml_and_requires_both_languages() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("terms.yaml");
        std::fs::write(&good, "- fr: Arrêté\n  en: Order\n").unwrap();
        let terms = load_term_file(&good).unwrap();
        assert_eq!(terms[0].category, NEW_TERM_CATEGORY);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"[{"fr": "Arrêté", "en": " "}]"#).unwrap();
        assert!(load_term_file(&bad).is_err());
    }

    #[test]
    fn bank_document_lists_each_term() {
        let mut t = term("Décret", "Decree", "Legal");
        t.example_en = Some("A decree was signed.".to_owned());
        let html = bank_html(&[&t]);
        assert!(html.starts_with("<h1>Terminology Bank / Banque Terminologique</h1>"));
        assert!(html.contains("<b>Décret  /  Decree</b><br>[Legal]"));
        assert!(html.contains("<i>Ex (EN): \"A decree was signed.\"</i>"));
        assert!(!html.contains("Définition (FR)"));
    }
}
