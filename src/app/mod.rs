//! HTTP functions behind the portal (`govdoc-app`): translate, generate-quiz, and the admin
//! user endpoints.

pub mod directory;
pub mod handlers;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::{PortalError, PortalResult};
use crate::formats::ErrorBody;
use crate::locale::Locale;
use crate::quiz::{AttemptStore, GatewayQuizGenerator, QuizGenerator, QuizQuestion};
use crate::terminology::Term;
use crate::translate::{GatewayTranslator, TranslationRequest, TranslationResponse, Translator};

use self::directory::Directory;

pub const FUNCTIONS_PREFIX: &str = "/functions/v1";

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn Directory>,
    pub attempts: Arc<dyn AttemptStore>,
    pub translator: Arc<dyn Translator>,
    pub quiz: Arc<dyn QuizGenerator>,
}

impl AppState {
    /// Gateway-backed translator and quiz generator. Without an API key both still exist but
    /// answer every call with a configuration error.
    pub fn with_gateway(
        config: &GatewayConfig,
        directory: Arc<dyn Directory>,
        attempts: Arc<dyn AttemptStore>,
    ) -> anyhow::Result<Self> {
        let (translator, quiz): (Arc<dyn Translator>, Arc<dyn QuizGenerator>) =
            if config.api_key.is_some() {
                (
                    Arc::new(GatewayTranslator::new(config)?),
                    Arc::new(GatewayQuizGenerator::new(config)?),
                )
            } else {
                tracing::warn!("GOVDOC_GATEWAY_API_KEY is not set; translate and generate-quiz will fail");
                (Arc::new(Unconfigured), Arc::new(Unconfigured))
            };
        Ok(Self {
            directory,
            attempts,
            translator,
            quiz,
        })
    }
}

struct Unconfigured;

fn not_configured() -> PortalError {
    PortalError::Service {
        status: 500,
        message: "GOVDOC_GATEWAY_API_KEY is not configured".to_owned(),
    }
}

#[async_trait]
impl Translator for Unconfigured {
    async fn translate(&self, _request: &TranslationRequest) -> PortalResult<TranslationResponse> {
        Err(not_configured())
    }
}

#[async_trait]
impl QuizGenerator for Unconfigured {
    async fn generate(&self, _terms: &[Term], _lang: Locale) -> PortalResult<Vec<QuizQuestion>> {
        Err(not_configured())
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    let functions = Router::new()
        .route("/translate", post(handlers::translate))
        .route("/generate-quiz", post(handlers::generate_quiz))
        .route("/delete-user", post(handlers::delete_user))
        .route(
            "/get-user-emails",
            get(handlers::get_user_emails).post(handlers::get_user_emails),
        );

    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .nest(FUNCTIONS_PREFIX, functions)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error response carrying `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError(pub PortalError);

impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        Self(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(PortalError::Service {
            status: 500,
            message: format!("{err:#}"),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = axum::http::StatusCode::from_u16(self.0.http_status())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "function failed");
        } else {
            tracing::warn!(error = %self.0, status = status.as_u16(), "function rejected request");
        }
        let body = ErrorBody {
            error: self.0.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
