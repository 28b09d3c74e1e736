//! Markup-preserving translation through the gateway or the hosted translate function.

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cli::{Engine, TranslateArgs};
use crate::config::{self, FunctionsConfig, GatewayConfig};
use crate::error::{PortalError, PortalResult};
use crate::formats::{self, TranslateBody, TranslateReply};
use crate::gateway::{self, ChatMessage};
use crate::html;

pub const AUTO_DETECT: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub payload: String,
    /// Language code, or `auto`.
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translated_payload: String,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> PortalResult<TranslationResponse>;
}

/// Echoes the payload. Useful offline and for wiring tests; it does not translate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, request: &TranslationRequest) -> PortalResult<TranslationResponse> {
        Ok(TranslationResponse {
            translated_payload: request.payload.clone(),
        })
    }
}

pub fn language_name(code: &str) -> &str {
    match code {
        "fr" => "French",
        "en" => "English",
        "ar" => "Arabic",
        "es" => "Spanish",
        "de" => "German",
        other => other,
    }
}

pub fn system_prompt(source_lang: &str, target_lang: &str) -> String {
    let to = language_name(target_lang);
    let task = if source_lang == AUTO_DETECT {
        format!("Auto-detect the language of the following text and translate it to {to}.")
    } else {
        let from = language_name(source_lang);
        format!("Translate the following text from {from} to {to}.")
    };
    format!(
        "You are a professional translator specializing in government and official documents. \
         {task} IMPORTANT: If the text contains HTML tags, preserve ALL HTML formatting exactly \
         (bold, italic, underline, alignment styles, font sizes, paragraph tags, etc.). Only \
         translate the text content inside the tags, never modify the HTML structure or \
         attributes. Only return the translated text, nothing else."
    )
}

pub struct GatewayTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GatewayTranslator {
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
impl Translator for GatewayTranslator {
    async fn translate(&self, request: &TranslationRequest) -> PortalResult<TranslationResponse> {
        tracing::info!(
            engine = "gateway",
            model = %self.model,
            from = %request.source_lang,
            to = %request.target_lang,
            chars = request.payload.len(),
            "translate"
        );
        let messages = [
            ChatMessage::system(system_prompt(&request.source_lang, &request.target_lang)),
            ChatMessage::user(request.payload.clone()),
        ];
        let translated =
            gateway::chat_text(&self.client, &self.endpoint, &self.api_key, &self.model, &messages)
                .await?;
        Ok(TranslationResponse {
            translated_payload: translated,
        })
    }
}

/// Calls the hosted `translate` function (`{ text, sourceLang, targetLang }`).
pub struct FunctionsTranslator {
    client: reqwest::Client,
    url: url::Url,
    token: Option<String>,
}

impl FunctionsTranslator {
    pub fn new(config: &FunctionsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config::http_client(config.timeout)?,
            url: config.function_url("translate")?,
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl Translator for FunctionsTranslator {
    async fn translate(&self, request: &TranslationRequest) -> PortalResult<TranslationResponse> {
        tracing::info!(
            engine = "functions",
            url = %self.url,
            from = %request.source_lang,
            to = %request.target_lang,
            "translate"
        );
        let body = TranslateBody {
            text: request.payload.clone(),
            source_lang: request.source_lang.clone(),
            target_lang: request.target_lang.clone(),
        };
        let raw = post_function(&self.client, &self.url, self.token.as_deref(), &body).await?;
        let reply: TranslateReply = serde_json::from_str(&raw).map_err(|err| PortalError::Service {
            status: 500,
            message: format!("parse translate reply: {err}"),
        })?;
        Ok(TranslationResponse {
            translated_payload: reply.translated,
        })
    }
}

/// POSTs JSON to a hosted function and returns the raw success body.
///
/// Non-success statuses and `{ "error": ... }` bodies become [`PortalError`]s.
pub async fn post_function<B: Serialize + Sync>(
    client: &reqwest::Client,
    url: &url::Url,
    token: Option<&str>,
    body: &B,
) -> PortalResult<String> {
    let mut request = client.post(url.clone()).json(body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await
        .map_err(|err| PortalError::ServiceUnavailable(format!("POST {url}: {err}")))?;

    let status = response.status().as_u16();
    let raw = response
        .text()
        .await
        .map_err(|err| PortalError::ServiceUnavailable(format!("read {url}: {err}")))?;

    if !(200..300).contains(&status) {
        let message = formats::error_message(&raw).unwrap_or_else(|| raw.clone());
        return Err(PortalError::from_status(status, message));
    }
    if let Some(message) = formats::error_message(&raw) {
        return Err(PortalError::Service { status, message });
    }
    Ok(raw)
}

/// Logs a warning when the translation's tag counts differ from the source's.
pub fn markup_preserved(source: &str, translated: &str) -> bool {
    let expected = html::tag_counts(&html::parse_fragment(source));
    let actual = html::tag_counts(&html::parse_fragment(translated));
    if expected != actual {
        tracing::warn!(?expected, ?actual, "translation changed the markup structure");
        return false;
    }
    true
}

/// Translates a payload, rejecting blank input before any remote call.
pub async fn translate_payload(
    translator: &dyn Translator,
    payload: &str,
    source_lang: &str,
    target_lang: &str,
) -> PortalResult<String> {
    if payload.trim().is_empty() {
        return Err(PortalError::Validation("Nothing to translate".to_owned()));
    }
    let request = TranslationRequest {
        payload: payload.to_owned(),
        source_lang: source_lang.to_owned(),
        target_lang: target_lang.to_owned(),
    };
    let response = translator.translate(&request).await?;
    markup_preserved(payload, &response.translated_payload);
    Ok(response.translated_payload)
}

pub fn translator_for(
    engine: Engine,
    functions_url: Option<&str>,
) -> anyhow::Result<Box<dyn Translator>> {
    Ok(match engine {
        Engine::Noop => Box::new(NoopTranslator),
        Engine::Gateway => Box::new(GatewayTranslator::new(&GatewayConfig::from_env())?),
        Engine::Functions => Box::new(FunctionsTranslator::new(&FunctionsConfig::resolve(
            functions_url,
        )?)?),
    })
}

pub async fn run(args: TranslateArgs) -> anyhow::Result<()> {
    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("read input: {}", args.input))?;

    let translator = translator_for(args.engine, args.functions_url.as_deref())?;
    let translated = translate_payload(translator.as_ref(), &input, &args.from, &args.to)
        .await
        .context("translate")?;

    if translated.trim().is_empty() {
        anyhow::bail!("translation output is empty");
    }
    crate::output::write_text(args.out.as_deref(), &translated, args.force)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_uses_language_names_and_auto_detect_wording() {
        let prompt = system_prompt("fr", "en");
        assert!(prompt.contains("from French to English"));
        let auto = system_prompt(AUTO_DETECT, "de");
        assert!(auto.contains("Auto-detect the language"));
        assert!(auto.contains("translate it to German"));
        assert!(system_prompt("it", "pt").contains("from it to pt"));
    }

    #[test]
    fn markup_check_compares_tag_counts() {
        assert!(markup_preserved("<p>a <b>b</b></p>", "<p>x <b>y</b></p>"));
        assert!(!markup_preserved("<p>a</p><p>b</p>", "<p>x y</p>"));
    }

    #[tokio::test]
    async fn blank_payload_is_rejected_before_calling_out() {
        let err = translate_payload(&NoopTranslator, "  \n", "auto", "en")
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[tokio::test]
    async fn noop_translator_echoes() {
        let out = translate_payload(&NoopTranslator, "<p>Bonjour</p>", "fr", "en")
            .await
            .unwrap();
        assert_eq!(out, "<p>Bonjour</p>");
    }
}
