use async_trait::async_trait;

use crate::config::{self, FunctionsConfig, GatewayConfig};
use crate::error::{PortalError, PortalResult};
use crate::formats::{QuizBody, QuizReply};
use crate::gateway::{self, ChatMessage, ForcedTool};
use crate::locale::Locale;
use crate::quiz::{QUESTIONS_PER_QUIZ, QuestionKind, QuizQuestion};
use crate::terminology::Term;
use crate::translate;

pub const SYSTEM_PROMPT: &str = "You are a quiz generator for a government terminology learning platform. Generate quizzes using ONLY the provided terminology terms. You must return valid JSON using the tool provided.";
pub const QUOTA_MESSAGE: &str = "Payment required.";
pub const RATE_LIMIT_MESSAGE: &str = "Rate limited, please try again later.";

/// Produces raw questions for a set of sampled terms.
#[async_trait]
pub trait QuizGenerator: Send + Sync {
    async fn generate(&self, terms: &[Term], lang: Locale) -> PortalResult<Vec<QuizQuestion>>;
}

/// One line per term, as sent to the model.
pub fn term_line(term: &Term) -> String {
    let or_empty = |value: &Option<String>| value.clone().unwrap_or_default();
    format!(
        "FR: {} | EN: {} | Def FR: {} | Def EN: {} | Ex FR: {} | Ex EN: {}",
        term.fr,
        term.en,
        or_empty(&term.definition_fr),
        or_empty(&term.definition_en),
        or_empty(&term.example_fr),
        or_empty(&term.example_en),
    )
}

pub fn user_prompt(terms: &[Term], lang: Locale) -> String {
    let terms_list = terms.iter().map(term_line).collect::<Vec<_>>().join("\n");
    let language = match lang {
        Locale::Fr => "French",
        Locale::En => "English",
    };
    format!(
        "Generate a quiz with exactly {QUESTIONS_PER_QUIZ} questions using these terminology terms:\n\n\
         {terms_list}\n\n\
         Create a mix of 3 types:\n\
         - \"multiple_choice\": Give a term (FR or EN) and 4 options for its translation. Only 1 is correct.\n\
         - \"fill_blank\": Give a sentence with a blank (___) where the user must type the correct term.\n\
         - \"match_definition\": Give a definition and 4 term options. Only 1 matches the definition.\n\n\
         Make it varied and educational. Use {language} for instructions/questions."
    )
}

pub fn create_quiz_tool() -> ForcedTool<'static> {
    ForcedTool {
        name: "create_quiz",
        description: "Create a terminology quiz with questions",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": { "type": "string", "enum": ["multiple_choice", "fill_blank", "match_definition"] },
                            "question": { "type": "string" },
                            "options": { "type": "array", "items": { "type": "string" } },
                            "correct_answer": { "type": "string" },
                        },
                        "required": ["type", "question", "correct_answer"],
                        "additionalProperties": false,
                    },
                },
            },
            "required": ["questions"],
            "additionalProperties": false,
        }),
    }
}

fn parse_reply(value: serde_json::Value) -> PortalResult<Vec<QuizQuestion>> {
    let reply: QuizReply = serde_json::from_value(value).map_err(|err| PortalError::Service {
        status: 500,
        message: format!("invalid quiz: {err}"),
    })?;
    Ok(reply.questions)
}

/// Asks the gateway directly, forcing the `create_quiz` tool.
pub struct GatewayQuizGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GatewayQuizGenerator {
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config::http_client(config.timeout)?,
            endpoint: gateway::chat_completions_endpoint(&config.base_url),
            api_key: config.require_api_key()?.to_owned(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl QuizGenerator for GatewayQuizGenerator {
    async fn generate(&self, terms: &[Term], lang: Locale) -> PortalResult<Vec<QuizQuestion>> {
        tracing::info!(engine = "gateway", model = %self.model, terms = terms.len(), lang = lang.code(), "generate quiz");
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(terms, lang)),
        ];
        let result = gateway::chat_tool_call(
            &self.client,
            &self.endpoint,
            &self.api_key,
            &self.model,
            &messages,
            &create_quiz_tool(),
        )
        .await;
        match result {
            Ok(arguments) => parse_reply(arguments),
            Err(PortalError::RateLimited(_)) => {
                Err(PortalError::RateLimited(RATE_LIMIT_MESSAGE.to_owned()))
            }
            Err(PortalError::QuotaExceeded(_)) => {
                Err(PortalError::QuotaExceeded(QUOTA_MESSAGE.to_owned()))
            }
            Err(err) => Err(err),
        }
    }
}

/// Calls the hosted `generate-quiz` function.
pub struct FunctionsQuizGenerator {
    client: reqwest::Client,
    url: url::Url,
    token: Option<String>,
}

impl FunctionsQuizGenerator {
    pub fn new(config: &FunctionsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config::http_client(config.timeout)?,
            url: config.function_url("generate-quiz")?,
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl QuizGenerator for FunctionsQuizGenerator {
    async fn generate(&self, terms: &[Term], lang: Locale) -> PortalResult<Vec<QuizQuestion>> {
        tracing::info!(engine = "functions", url = %self.url, terms = terms.len(), "generate quiz");
        let body = QuizBody {
            terms: terms.to_vec(),
            lang: lang.code().to_owned(),
        };
        let raw = translate::post_function(&self.client, &self.url, self.token.as_deref(), &body).await?;
        let value = serde_json::from_str(&raw).map_err(|err| PortalError::Service {
            status: 500,
            message: format!("parse generate-quiz reply: {err}"),
        })?;
        parse_reply(value)
    }
}

/// Builds questions from the terms alone, without a model. Multiple-choice translations,
/// fill-in-the-blank from examples and definition matching, cycling until ten questions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalQuizGenerator;

#[async_trait]
impl QuizGenerator for LocalQuizGenerator {
    async fn generate(&self, terms: &[Term], lang: Locale) -> PortalResult<Vec<QuizQuestion>> {
        Ok(local_questions(terms, lang))
    }
}

pub fn local_questions(terms: &[Term], lang: Locale) -> Vec<QuizQuestion> {
    if terms.is_empty() {
        return Vec::new();
    }
    let kinds = [
        QuestionKind::MultipleChoice,
        QuestionKind::FillBlank,
        QuestionKind::MatchDefinition,
    ];
    (0..QUESTIONS_PER_QUIZ)
        .map(|i| {
            let term = &terms[i % terms.len()];
            local_question(kinds[i % kinds.len()], term, terms, lang)
        })
        .collect()
}

fn local_question(kind: QuestionKind, term: &Term, terms: &[Term], lang: Locale) -> QuizQuestion {
    let (asked, answer) = match lang {
        Locale::Fr => (&term.en, &term.fr),
        Locale::En => (&term.fr, &term.en),
    };
    let options = || {
        let mut options: Vec<String> = terms
            .iter()
            .map(|t| t.in_lang(lang.code()).to_owned())
            .filter(|t| t != answer)
            .take(3)
            .collect();
        options.insert(options.len().min(term.en.len() % 4), answer.clone());
        Some(options)
    };

    match kind {
        QuestionKind::MultipleChoice => QuizQuestion {
            kind,
            question: match lang {
                Locale::Fr => format!("Quelle est la traduction de « {asked} » ?"),
                Locale::En => format!("What is the translation of \"{asked}\"?"),
            },
            options: options(),
            correct_answer: answer.clone(),
            suggestions: None,
            match_pairs: None,
        },
        QuestionKind::FillBlank => {
            let example = match lang {
                Locale::Fr => term.example_fr.as_deref(),
                Locale::En => term.example_en.as_deref(),
            };
            let question = example
                .filter(|e| e.to_lowercase().contains(&answer.to_lowercase()))
                .map(|e| blank_out(e, answer))
                .unwrap_or_else(|| match lang {
                    Locale::Fr => format!("« {asked} » se dit ___ en français."),
                    Locale::En => format!("\"{asked}\" is ___ in English."),
                });
            QuizQuestion {
                kind,
                question,
                options: None,
                correct_answer: answer.clone(),
                suggestions: None,
                match_pairs: None,
            }
        }
        QuestionKind::MatchDefinition => QuizQuestion {
            kind,
            question: match lang {
                Locale::Fr => "Associez chaque terme français à sa traduction.".to_owned(),
                Locale::En => "Match each French term with its translation.".to_owned(),
            },
            options: None,
            correct_answer: answer.clone(),
            suggestions: None,
            match_pairs: None,
        },
    }
}

fn blank_out(sentence: &str, answer: &str) -> String {
    let lower = sentence.to_lowercase();
    let needle = answer.to_lowercase();
    let end = |start: usize| start + needle.len();
    match lower.find(&needle) {
        Some(start)
            if lower.len() == sentence.len()
                && sentence.is_char_boundary(start)
                && sentence.is_char_boundary(end(start)) =>
        {
            format!("{}___{}", &sentence[..start], &sentence[end(start)..])
        }
        _ => sentence.replace(answer, "___"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_lines_leave_missing_fields_empty() {
        let term = Term::new("Décret", "Decree");
        assert_eq!(
            term_line(&term),
            "FR: Décret | EN: Decree | Def FR:  | Def EN:  | Ex FR:  | Ex EN: "
        );
    }

    #[test]
    fn prompt_names_the_instruction_language() {
        let terms = vec![Term::new("Loi", "Law")];
        assert!(user_prompt(&terms, Locale::Fr).ends_with("Use French for instructions/questions."));
        assert!(user_prompt(&terms, Locale::En).contains("exactly 10 questions"));
    }

    #[test]
    fn tool_schema_requires_questions() {
        let tool = create_quiz_tool();
        assert_eq!(tool.name, "create_quiz");
        assert_eq!(tool.parameters["required"], serde_json::json!(["questions"]));
    }

    #[test]
    fn local_questions_cycle_kinds_and_answer_in_quiz_language() {
        let terms = vec![
            Term {
                example_en: Some("The decree was signed.".to_owned()),
                ..Term::new("Décret", "Decree")
            },
            Term::new("Loi", "Law"),
            Term::new("Budget", "Budget"),
            Term::new("Circulaire", "Circular"),
        ];
        let questions = local_questions(&terms, Locale::En);
        assert_eq!(questions.len(), QUESTIONS_PER_QUIZ);
        assert_eq!(questions[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(questions[0].correct_answer, "Decree");
        let options = questions[0].options.as_ref().unwrap();
        assert_eq!(options.len(), 4);
        assert!(options.contains(&"Decree".to_owned()));
        assert_eq!(questions[1].kind, QuestionKind::FillBlank);
        assert_eq!(questions[1].question, "\"Loi\" is ___ in English.");
        assert_eq!(questions[4].question, "The ___ was signed.");
    }
}
