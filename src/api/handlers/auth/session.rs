//! Session endpoints for cookie and bearer auth.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::{
    state::{AuthConfig, AuthState},
    types::SessionResponse,
};
use crate::auth::{RequestContext, Session};

pub const SESSION_COOKIE_NAME: &str = "gatehouse_session";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match current_session(&headers, &auth_state).await {
        Ok(Some(session)) => {
            (StatusCode::OK, Json(SessionResponse::from(&session))).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(status) => status.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 303, description = "Session cleared, redirect to the landing page")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        match auth_state.sessions().revoke(&token).await {
            Ok(()) => info!("Session revoked"),
            Err(err) => error!("Failed to delete session: {err}"),
        }
    }

    // The cookie is cleared even when no session record existed.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    match HeaderValue::from_str(auth_state.config().landing_path()) {
        Ok(location) => {
            response_headers.insert(LOCATION, location);
        }
        Err(err) => error!("Invalid landing path: {err}"),
    }
    (StatusCode::SEE_OTHER, response_headers).into_response()
}

/// Build the guard context for this request.
///
/// A missing, unknown or expired token yields an empty context.
pub(crate) async fn request_context(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<RequestContext, StatusCode> {
    current_session(headers, auth_state)
        .await
        .map(RequestContext::new)
}

async fn current_session(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<Option<Session>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    auth_state.sessions().current(&token).await.map_err(|err| {
        error!("Failed to lookup session: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Build an `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    auth_config: &AuthConfig,
    token: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    );
    if auth_config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(auth_config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    session_cookie(auth_config, "", 0)
}

pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty())
            .then(|| val.trim().to_string())
    })
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
