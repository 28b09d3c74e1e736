//! Catalogue of official letter templates, bilingual, grouped by purpose.

use serde::{Deserialize, Serialize};

use crate::cli::{LettersListArgs, LettersRenderArgs};
use crate::html;
use crate::locale::{self, Locale};

const CATALOGUE_YAML: &str = include_str!("../assets/letters.yaml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bilingual {
    pub en: String,
    pub fr: String,
}

impl Bilingual {
    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::En => &self.en,
            Locale::Fr => &self.fr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterTemplate {
    pub id: String,
    pub label: Bilingual,
    pub body: Bilingual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterCategory {
    pub id: String,
    pub label: Bilingual,
    pub templates: Vec<LetterTemplate>,
}

pub fn catalogue() -> anyhow::Result<Vec<LetterCategory>> {
    serde_yaml::from_str(CATALOGUE_YAML)
        .map_err(|err| anyhow::anyhow!("parse embedded letter catalogue: {err}"))
}

pub fn find_template<'a>(catalogue: &'a [LetterCategory], id: &str) -> Option<&'a LetterTemplate> {
    catalogue
        .iter()
        .flat_map(|category| category.templates.iter())
        .find(|template| template.id == id)
}

/// Blank-line separated blocks become paragraphs; single newlines become `<br>`.
pub fn render_template(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    text.split("\n\n")
        .map(|block| {
            let lines: Vec<String> = block.split('\n').map(html::escape_text).collect();
            format!("<p>{}</p>", lines.join("<br>"))
        })
        .collect()
}

pub fn run_list(args: LettersListArgs) -> anyhow::Result<()> {
    let catalogue = catalogue()?;
    println!("{}", locale::tr(args.lang, "letters.header"));
    for category in &catalogue {
        println!();
        println!("{}", category.label.get(args.lang));
        for template in &category.templates {
            println!("  {:<24} {}", template.id, template.label.get(args.lang));
        }
    }
    Ok(())
}

pub fn run_render(args: LettersRenderArgs) -> anyhow::Result<()> {
    let catalogue = catalogue()?;
    let Some(template) = find_template(&catalogue, &args.id) else {
        anyhow::bail!("unknown letter template: {} (see `govdoc letters list`)", args.id);
    };
    tracing::info!(template = %template.id, lang = args.lang.code(), "render letter");
    let body = template.body.get(args.lang);
    let contents = if args.plain {
        body.to_owned()
    } else {
        render_template(body)
    };
    crate::output::write_text(args.out.as_deref(), &contents, args.force)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_has_four_bilingual_categories() {
        let catalogue = catalogue().unwrap();
        let ids: Vec<&str> = catalogue.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["request", "invitation", "complaint", "response"]);
        for category in &catalogue {
            assert!(!category.templates.is_empty());
            for template in &category.templates {
                assert!(!template.body.en.trim().is_empty(), "{}", template.id);
                assert!(!template.body.fr.trim().is_empty(), "{}", template.id);
            }
        }
    }

    #[test]
    fn render_splits_paragraphs_and_lines() {
        assert_eq!(
            render_template("[Name]\n[Date]\n\nDear Sir & Madam,"),
            "<p>[Name]<br>[Date]</p><p>Dear Sir &amp; Madam,</p>"
        );
    }

    #[test]
    fn templates_are_found_by_id() {
        let catalogue = catalogue().unwrap();
        let template = find_template(&catalogue, "request-leave").unwrap();
        assert_eq!(template.label.get(Locale::Fr), "Demande de congé");
        assert!(find_template(&catalogue, "nope").is_none());
    }
}
