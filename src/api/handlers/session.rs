//! Session lookup for tokens issued by the external auth provider.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE},
    },
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::principal::AuthGate;
use crate::api::error::{ApiError, MessageResponse};

pub const SESSION_COOKIE_NAME: &str = "appraisal_session";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub email: String,
    pub is_admin: bool,
}

#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session"),
        (status = 500, description = "Session lookup failed", body = MessageResponse),
    ),
    tag = "session"
)]
pub async fn session(
    headers: HeaderMap,
    gate: Extension<Arc<AuthGate>>,
) -> Result<impl IntoResponse, ApiError> {
    // Missing sessions are not an error here; the client uses 204 to redirect to login.
    let Some(identity) = gate.authenticate(&headers).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let is_admin = gate
        .is_admin(&identity.email)
        .await
        .map_err(|err| ApiError::internal("Failed to check admin membership", err))?;

    Ok((
        StatusCode::OK,
        Json(SessionResponse {
            email: identity.email,
            is_admin,
        }),
    )
        .into_response())
}

/// Pull the session token from `Authorization: Bearer` or the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    for pair in value.split(';') {
        let Some((key, val)) = pair.split_once('=') else {
            continue;
        };
        let val = val.trim();
        if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(COOKIE, HeaderValue::from_static("appraisal_session=def"));
        assert_eq!(extract_session_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn cookie_token_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; appraisal_session=xyz; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("xyz".to_string()));
    }

    #[test]
    fn missing_or_empty_tokens_yield_none() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        headers.insert(COOKIE, HeaderValue::from_static("appraisal_session="));
        assert_eq!(extract_session_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_session_token(&headers), None);
    }
}
