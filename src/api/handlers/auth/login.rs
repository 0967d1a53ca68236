//! `POST /v1/auth/login`.
//!
//! Flow Overview:
//! - Password only: on success a challenge session is opened and `202` is
//!   returned; the browser moves on to the OTP page.
//! - OTP (with the challenge session cookie): on success the challenge session
//!   is upgraded in place and `200` is returned. Without a live challenge
//!   session for the same user the OTP opens nothing (`401 session missing`).
//! - Password and OTP together: a full session is created and `200` is returned.
//! - Any rejection answers `401` with the reason and leaves sessions untouched.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::{
    session::{extract_session_token, session_cookie},
    state::AuthState,
    types::{LoginRequest, LoginResponse},
};
use crate::auth::{session::IssuedSession, AuthError, AuthOutcome, Credentials, Identifier};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 202, description = "Password accepted, OTP required", body = LoginResponse),
        (status = 400, description = "Missing or ambiguous identifier", body = LoginResponse),
        (status = 401, description = "Credentials rejected, or OTP without a challenge session", body = LoginResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let identifier = match Identifier::from_parts(
        request.email.as_deref(),
        request.phone_number.as_deref(),
    ) {
        Ok(identifier) => identifier,
        Err(reason) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(LoginResponse::rejected(reason)),
            )
                .into_response();
        }
    };

    let mut credentials = Credentials::new(identifier);
    if let Some(password) = request.password {
        credentials = credentials.with_password(password);
    }
    if let Some(otp) = request.otp {
        credentials = credentials.with_otp(otp);
    }

    let outcome = match auth_state.authenticator().authenticate(&credentials).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Failed to read credential store: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let password_checked = credentials.password.is_some();
    let current_token = extract_session_token(&headers);
    let sessions = auth_state.sessions();
    let ttl = sessions.ttl();

    match outcome {
        AuthOutcome::Rejected { reason } => rejected(reason),
        AuthOutcome::ChallengeRequired { identity } => {
            let body = LoginResponse::challenge_required(&identity);
            match sessions
                .start_challenge(current_token.as_deref(), identity)
                .await
            {
                Ok(issued) => with_session(
                    &auth_state,
                    StatusCode::ACCEPTED,
                    &issued,
                    ttl.challenge_seconds,
                    body,
                ),
                Err(err) => {
                    error!("Failed to create challenge session: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        AuthOutcome::Authenticated { identity, role } if !password_checked => {
            let body = LoginResponse::authenticated(&identity, &role);
            match sessions
                .upgrade_challenge(current_token.as_deref(), &identity, role)
                .await
            {
                Ok(Some(issued)) => {
                    info!(session_id = %issued.session.id, "Sign-in completed");
                    with_session(
                        &auth_state,
                        StatusCode::OK,
                        &issued,
                        ttl.full_seconds,
                        body,
                    )
                }
                Ok(None) => rejected(AuthError::SessionMissing),
                Err(err) => {
                    error!("Failed to upgrade challenge session: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        AuthOutcome::Authenticated { identity, role } => {
            let body = LoginResponse::authenticated(&identity, &role);
            match sessions
                .complete(current_token.as_deref(), identity, role)
                .await
            {
                Ok(issued) => {
                    info!(session_id = %issued.session.id, "Sign-in completed");
                    with_session(
                        &auth_state,
                        StatusCode::OK,
                        &issued,
                        ttl.full_seconds,
                        body,
                    )
                }
                Err(err) => {
                    error!("Failed to create session: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
    }
}

fn rejected(reason: AuthError) -> axum::response::Response {
    info!(%reason, "Sign-in rejected");
    (
        StatusCode::UNAUTHORIZED,
        Json(LoginResponse::rejected(reason)),
    )
        .into_response()
}

fn with_session(
    auth_state: &AuthState,
    status: StatusCode,
    issued: &IssuedSession,
    max_age_seconds: i64,
    body: LoginResponse,
) -> axum::response::Response {
    let mut headers = HeaderMap::new();
    match session_cookie(auth_state.config(), &issued.token, max_age_seconds) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    (status, headers, Json(body)).into_response()
}
