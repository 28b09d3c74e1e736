use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::Json;
use serde::de::DeserializeOwned;

use crate::app::directory::{Account, Role};
use crate::app::{ApiError, AppState};
use crate::error::PortalError;
use crate::formats::{
    DeleteUserBody, EmailMapReply, QuizBody, QuizReply, SuccessReply, TranslateBody,
    TranslateReply,
};
use crate::locale::Locale;
use crate::translate::TranslationRequest;

pub async fn translate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TranslateReply>, ApiError> {
    let body: TranslateBody = parse_body(&body)?;
    tracing::info!(from = %body.source_lang, to = %body.target_lang, chars = body.text.len(), "translate function");
    let request = TranslationRequest {
        payload: body.text,
        source_lang: body.source_lang,
        target_lang: body.target_lang,
    };
    let response = state
        .translator
        .translate(&request)
        .await
        .map_err(upstream)?;
    Ok(Json(TranslateReply {
        translated: response.translated_payload,
    }))
}

pub async fn generate_quiz(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<QuizReply>, ApiError> {
    let body: QuizBody = parse_body(&body)?;
    let lang = Locale::from_code(&body.lang).unwrap_or_default();
    tracing::info!(terms = body.terms.len(), lang = lang.code(), "generate-quiz function");
    let questions = state
        .quiz
        .generate(&body.terms, lang)
        .await
        .map_err(upstream)?;
    Ok(Json(QuizReply { questions }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SuccessReply>, ApiError> {
    let token = bearer_token(&headers)?;
    let body: DeleteUserBody = parse_body(&body)?;
    let Some(user_id) = body.user_id.filter(|id| !id.trim().is_empty()) else {
        return Err(PortalError::Validation("Missing userId".to_owned()).into());
    };
    let caller = require_admin(&state, token).await?;

    if state.directory.role_of(&user_id).await? == Some(Role::Admin) {
        return Err(PortalError::Forbidden("Cannot delete admin users".to_owned()).into());
    }

    let quiz_results = state.attempts.delete_for_user(&user_id).await?;
    state.directory.delete_profile(&user_id).await?;
    state.directory.delete_role(&user_id).await?;
    if !state.directory.delete_account(&user_id).await? {
        return Err(PortalError::Service {
            status: 500,
            message: format!("User not found: {user_id}"),
        }
        .into());
    }
    tracing::info!(by = %caller.id, user_id = %user_id, quiz_results, "deleted user");
    Ok(Json(SuccessReply { success: true }))
}

pub async fn get_user_emails(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<EmailMapReply>, ApiError> {
    let token = bearer_token(&headers)?;
    require_admin(&state, token).await?;
    let email_map = state.directory.emails().await?;
    Ok(Json(EmailMapReply { email_map }))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| PortalError::Validation(format!("invalid request body: {err}")).into())
}

/// Passes rate-limit and quota errors through; everything else upstream is a 500.
fn upstream(err: PortalError) -> ApiError {
    match err {
        PortalError::RateLimited(_) | PortalError::QuotaExceeded(_) => ApiError(err),
        other => ApiError(PortalError::Service {
            status: 500,
            message: other.public_message(),
        }),
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PortalError::Unauthorized("No auth".to_owned()))?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    Ok(token)
}

/// Resolves the caller and re-reads their role before any admin action.
async fn require_admin(state: &AppState, token: &str) -> Result<Account, ApiError> {
    let Some(account) = state.directory.account_for_token(token).await? else {
        return Err(PortalError::Unauthorized("Unauthorized".to_owned()).into());
    };
    if state.directory.role_of(&account.id).await? != Some(Role::Admin) {
        return Err(PortalError::Forbidden("Forbidden".to_owned()).into());
    }
    Ok(account)
}
