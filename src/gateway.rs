//! OpenAI-compatible chat-completions client for the language-model gateway.

use serde::{Deserialize, Serialize};

use crate::error::{PortalError, PortalResult};

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
pub const QUOTA_MESSAGE: &str = "Usage limit reached. Please add credits.";

pub fn chat_completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_owned(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// A function tool the model is forced to call.
#[derive(Debug, Clone)]
pub struct ForcedTool<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub parameters: serde_json::Value,
}

/// Returns `choices[0].message.content` (empty when the model sent none).
pub async fn chat_text(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    messages: &[ChatMessage],
) -> PortalResult<String> {
    let body = serde_json::json!({
        "model": model,
        "messages": messages,
    });
    let value = post_chat(client, endpoint, api_key, &body).await?;
    Ok(value
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned())
}

/// Forces a tool call and returns its parsed `arguments` object.
pub async fn chat_tool_call(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    messages: &[ChatMessage],
    tool: &ForcedTool<'_>,
) -> PortalResult<serde_json::Value> {
    let body = serde_json::json!({
        "model": model,
        "messages": messages,
        "tools": [{
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            },
        }],
        "tool_choice": { "type": "function", "function": { "name": tool.name } },
    });
    let value = post_chat(client, endpoint, api_key, &body).await?;

    let arguments = value
        .pointer("/choices/0/message/tool_calls/0/function/arguments")
        .ok_or_else(|| PortalError::Service {
            status: 500,
            message: "No tool call in response".to_owned(),
        })?;
    match arguments {
        serde_json::Value::String(raw) => {
            serde_json::from_str(raw).map_err(|err| PortalError::Service {
                status: 500,
                message: format!("invalid tool call arguments: {err}"),
            })
        }
        other => Ok(other.clone()),
    }
}

async fn post_chat(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> PortalResult<serde_json::Value> {
    tracing::debug!(endpoint, "gateway request");
    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|err| PortalError::ServiceUnavailable(format!("POST {endpoint}: {err}")))?;

    let status = response.status().as_u16();
    let raw = response
        .text()
        .await
        .map_err(|err| PortalError::ServiceUnavailable(format!("read gateway response: {err}")))?;

    if !(200..300).contains(&status) {
        tracing::warn!(status, body = %raw, "gateway error");
        return Err(match status {
            429 => PortalError::RateLimited(RATE_LIMIT_MESSAGE.to_owned()),
            402 => PortalError::QuotaExceeded(QUOTA_MESSAGE.to_owned()),
            _ => {
                let message = parse_error_message(&raw).unwrap_or_else(|| "AI gateway error".to_owned());
                PortalError::from_status(status, message)
            }
        });
    }

    serde_json::from_str(&raw).map_err(|err| PortalError::Service {
        status: 500,
        message: format!("parse gateway response: {err}"),
    })
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_owned)
}
