use std::time::Duration;

use anyhow::Context as _;

pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";
pub const DEFAULT_GATEWAY_MODEL: &str = "google/gemini-3-flash-preview";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Language-model gateway settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let base_url = env_non_empty("GOVDOC_GATEWAY_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_owned());
        let api_key = env_non_empty("GOVDOC_GATEWAY_API_KEY");
        let model =
            env_non_empty("GOVDOC_GATEWAY_MODEL").unwrap_or_else(|| DEFAULT_GATEWAY_MODEL.to_owned());
        Self {
            base_url,
            api_key,
            model,
            timeout: http_timeout_from_env(),
        }
    }

    pub fn require_api_key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GOVDOC_GATEWAY_API_KEY is not set"))
    }
}

/// Where the hosted translate / generate-quiz functions live (see `govdoc-app`).
#[derive(Debug, Clone)]
pub struct FunctionsConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl FunctionsConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = env_non_empty("GOVDOC_FUNCTIONS_URL")?;
        Some(Self {
            base_url,
            token: env_non_empty("GOVDOC_FUNCTIONS_TOKEN"),
            timeout: http_timeout_from_env(),
        })
    }

    /// `--functions-url` wins over the environment.
    pub fn resolve(cli_url: Option<&str>) -> anyhow::Result<Self> {
        if let Some(url) = cli_url {
            return Ok(Self {
                base_url: url.to_owned(),
                token: env_non_empty("GOVDOC_FUNCTIONS_TOKEN"),
                timeout: http_timeout_from_env(),
            });
        }
        Self::from_env().ok_or_else(|| {
            anyhow::anyhow!(
                "missing functions endpoint (pass --functions-url or set GOVDOC_FUNCTIONS_URL)"
            )
        })
    }

    pub fn function_url(&self, name: &str) -> anyhow::Result<url::Url> {
        let base = self.base_url.trim_end_matches('/');
        url::Url::parse(&format!("{base}/{name}"))
            .with_context(|| format!("invalid functions url: {}", self.base_url))
    }
}

pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("build http client")
}

fn http_timeout_from_env() -> Duration {
    let secs = std::env::var("GOVDOC_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
