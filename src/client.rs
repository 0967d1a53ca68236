//! HTTP backend for [`LoginFlow`](crate::auth::LoginFlow).
//!
//! Talks to `POST /v1/auth/login` and keeps the session cookie between the
//! password and OTP steps, so the server can upgrade the challenge session in
//! place.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{COOKIE, SET_COOKIE},
    Client, StatusCode,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Mutex;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    api::handlers::auth::{
        session::SESSION_COOKIE_NAME,
        types::{LoginRequest, LoginResponse, LoginStatus},
    },
    auth::{AuthBackend, AuthError, AuthOutcome, Credentials, Identifier, Identity, Role},
    APP_USER_AGENT,
};

pub struct HttpAuthBackend {
    client: Client,
    login_url: Url,
    session_token: Mutex<Option<SecretString>>,
}

impl HttpAuthBackend {
    /// # Errors
    /// Returns an error if `base_url` cannot be joined or the HTTP client cannot be built.
    pub fn new(base_url: &Url) -> Result<Self> {
        let login_url = base_url
            .join("/v1/auth/login")
            .context("Invalid server base URL")?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Error creating reqwest client")?;
        Ok(Self {
            client,
            login_url,
            session_token: Mutex::new(None),
        })
    }

    /// The session token from the last response that set one.
    #[must_use]
    pub fn session_token(&self) -> Option<SecretString> {
        self.session_token
            .lock()
            .ok()
            .and_then(|token| token.clone())
    }

    fn remember(&self, token: Option<String>) -> Result<()> {
        let Some(token) = token else {
            return Ok(());
        };
        let mut slot = self
            .session_token
            .lock()
            .map_err(|_| anyhow!("session token lock poisoned"))?;
        *slot = (!token.is_empty()).then(|| SecretString::from(token));
        Ok(())
    }
}

impl std::fmt::Debug for HttpAuthBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthBackend")
            .field("login_url", &self.login_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    #[instrument(skip_all, fields(url = %self.login_url))]
    async fn sign_in(&self, credentials: Credentials) -> Result<AuthOutcome> {
        let request = login_request(&credentials);
        let mut builder = self.client.post(self.login_url.clone()).json(&request);
        if let Some(token) = self.session_token() {
            builder = builder.header(
                COOKIE,
                format!("{SESSION_COOKIE_NAME}={}", token.expose_secret()),
            );
        }

        let response = builder.send().await.context("Login request failed")?;
        let status = response.status();
        let token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(session_token_from_set_cookie);
        self.remember(token)?;

        if status.is_server_error() {
            return Err(anyhow!("Login request returned {status}"));
        }
        let body: LoginResponse = response
            .json()
            .await
            .with_context(|| format!("Unexpected login response ({status})"))?;
        debug!(%status, status_body = ?body.status, "Login response");

        outcome(status, body, credentials.identifier)
    }
}

fn login_request(credentials: &Credentials) -> LoginRequest {
    let (email, phone_number) = match &credentials.identifier {
        Identifier::Email(email) => (Some(email.clone()), None),
        Identifier::Phone(phone) => (None, Some(phone.clone())),
    };
    LoginRequest {
        email,
        phone_number,
        password: credentials
            .password
            .as_ref()
            .map(|password| password.expose_secret().to_string()),
        otp: credentials
            .otp
            .as_ref()
            .map(|otp| otp.expose_secret().to_string()),
    }
}

fn outcome(status: StatusCode, body: LoginResponse, identifier: Identifier) -> Result<AuthOutcome> {
    let identity = || -> Result<Identity> {
        Ok(Identity {
            user_id: body.user_id.context("login response without user_id")?,
            name: body.name.clone().unwrap_or_default(),
            identifier: identifier.clone(),
        })
    };
    match body.status {
        LoginStatus::Rejected => {
            let reason = body
                .reason
                .as_deref()
                .and_then(AuthError::from_reason)
                .with_context(|| format!("Unknown rejection reason ({status})"))?;
            Ok(AuthOutcome::Rejected { reason })
        }
        LoginStatus::ChallengeRequired => Ok(AuthOutcome::ChallengeRequired {
            identity: identity()?,
        }),
        LoginStatus::Authenticated => {
            let role = body
                .role
                .as_deref()
                .map(Role::from)
                .context("login response without role")?;
            Ok(AuthOutcome::Authenticated {
                identity: identity()?,
                role,
            })
        }
    }
}

fn session_token_from_set_cookie(header: &str) -> Option<String> {
    let (name, value) = header.split(';').next()?.trim().split_once('=')?;
    (name.trim() == SESSION_COOKIE_NAME).then(|| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_token_is_extracted() {
        assert_eq!(
            session_token_from_set_cookie(
                "gatehouse_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=300"
            )
            .as_deref(),
            Some("abc")
        );
        assert_eq!(
            session_token_from_set_cookie("gatehouse_session=; Max-Age=0").as_deref(),
            Some("")
        );
        assert!(session_token_from_set_cookie("other=abc; Path=/").is_none());
    }

    #[test]
    fn login_request_carries_one_identifier() -> Result<()> {
        let credentials = Credentials::new(Identifier::phone("9185487532")?).with_password("p1");
        let request = login_request(&credentials);
        assert!(request.email.is_none());
        assert_eq!(request.phone_number.as_deref(), Some("9185487532"));
        assert_eq!(request.password.as_deref(), Some("p1"));
        assert!(request.otp.is_none());
        Ok(())
    }

    #[test]
    fn rejected_body_maps_back_to_the_reason() -> Result<()> {
        let body = LoginResponse::rejected(AuthError::InvalidOtp);
        let outcome = outcome(
            StatusCode::UNAUTHORIZED,
            body,
            Identifier::email("a@x.com")?,
        )?;
        assert_eq!(
            outcome,
            AuthOutcome::Rejected {
                reason: AuthError::InvalidOtp
            }
        );
        Ok(())
    }

    #[test]
    fn cleared_cookie_forgets_the_token() -> Result<()> {
        let backend = HttpAuthBackend::new(&Url::parse("http://127.0.0.1:8080")?)?;
        backend.remember(Some("tok".to_string()))?;
        assert!(backend.session_token().is_some());
        backend.remember(None)?;
        assert!(backend.session_token().is_some());
        backend.remember(Some(String::new()))?;
        assert!(backend.session_token().is_none());
        Ok(())
    }
}
