//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::auth::{guard::HOME_PATH, AuthError, Identity, Role, Session};

/// One sign-in attempt. Exactly one of `email` and `phone_number` must be set.
#[derive(ToSchema, Serialize, Deserialize, Default)]
pub struct LoginRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "phoneNumber", skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("otp", &self.otp.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    ChallengeRequired,
    Authenticated,
    Rejected,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub status: LoginStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl LoginResponse {
    #[must_use]
    pub fn rejected(reason: AuthError) -> Self {
        Self {
            status: LoginStatus::Rejected,
            reason: Some(reason.to_string()),
            user_id: None,
            name: None,
            role: None,
            redirect_to: None,
        }
    }

    #[must_use]
    pub fn challenge_required(identity: &Identity) -> Self {
        Self {
            status: LoginStatus::ChallengeRequired,
            reason: None,
            user_id: Some(identity.user_id),
            name: Some(identity.name.clone()),
            role: None,
            redirect_to: None,
        }
    }

    #[must_use]
    pub fn authenticated(identity: &Identity, role: &Role) -> Self {
        Self {
            status: LoginStatus::Authenticated,
            reason: None,
            user_id: Some(identity.user_id),
            name: Some(identity.name.clone()),
            role: Some(role.to_string()),
            redirect_to: Some(HOME_PATH.to_string()),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub session_id: String,
    pub user_id: u64,
    pub name: String,
    /// `email` or `phone`.
    pub identifier_kind: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub requires_otp: bool,
    pub expires_at_unix: i64,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            user_id: session.identity.user_id,
            name: session.identity.name.clone(),
            identifier_kind: session.identity.identifier.kind().to_string(),
            identifier: session.identity.identifier.value().to_string(),
            role: session.role.as_ref().map(ToString::to_string),
            requires_otp: session.requires_otp,
            expires_at_unix: session.expires_at_unix,
        }
    }
}

/// Body of a page the guard let through.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionResponse>,
}
