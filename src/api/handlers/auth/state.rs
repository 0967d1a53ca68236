//! Auth state and configuration.

use crate::auth::{guard::LOGIN_PATH, Authenticator, SessionIssuer, SessionTtl};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    challenge_ttl_seconds: i64,
    session_cookie_secure: bool,
    landing_path: String,
    frontend_base_url: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let ttl = SessionTtl::default();
        Self {
            session_ttl_seconds: ttl.full_seconds,
            challenge_ttl_seconds: ttl.challenge_seconds,
            session_cookie_secure: true,
            landing_path: LOGIN_PATH.to_string(),
            frontend_base_url: None,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl_seconds(mut self, seconds: i64) -> Self {
        self.challenge_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_landing_path(mut self, path: String) -> Self {
        self.landing_path = path;
        self
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: Option<String>) -> Self {
        self.frontend_base_url = url;
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> SessionTtl {
        SessionTtl {
            full_seconds: self.session_ttl_seconds,
            challenge_seconds: self.challenge_ttl_seconds,
        }
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    /// Where logout sends the browser.
    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> Option<&str> {
        self.frontend_base_url.as_deref()
    }
}

pub struct AuthState {
    config: AuthConfig,
    authenticator: Authenticator,
    sessions: SessionIssuer,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, authenticator: Authenticator, sessions: SessionIssuer) -> Self {
        Self {
            config,
            authenticator,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_session_ttl() {
        let config = AuthConfig::new();
        assert_eq!(config.session_ttl(), SessionTtl::default());
        assert!(config.session_cookie_secure());
        assert_eq!(config.landing_path(), LOGIN_PATH);
        assert!(config.frontend_base_url().is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = AuthConfig::new()
            .with_session_ttl_seconds(60)
            .with_challenge_ttl_seconds(10)
            .with_session_cookie_secure(false)
            .with_landing_path("/".to_string())
            .with_frontend_base_url(Some("http://localhost:5173".to_string()));
        assert_eq!(config.session_ttl().full_seconds, 60);
        assert_eq!(config.session_ttl().challenge_seconds, 10);
        assert!(!config.session_cookie_secure());
        assert_eq!(config.landing_path(), "/");
        assert_eq!(config.frontend_base_url(), Some("http://localhost:5173"));
    }
}
