use crate::{
    api::{self, AuthConfig, AuthState},
    auth::{
        Authenticator, JsonFileStore, LogOtpNotifier, MemorySessionStore, OtpNotifier,
        PgSessionStore, SessionIssuer, SessionStore, WebhookOtpNotifier,
    },
};
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub users_file: PathBuf,
    pub dsn: Option<SecretString>,
    pub session_ttl_seconds: i64,
    pub challenge_ttl_seconds: i64,
    pub cookie_secure: bool,
    pub landing_path: String,
    pub frontend_base_url: Option<String>,
    pub otp_webhook_url: Option<Url>,
    pub otp_webhook_timeout_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the session store cannot be reached, the OTP webhook
/// client cannot be built, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    if !args.users_file.exists() {
        warn!(
            "Users file {} does not exist yet; sign-in attempts will fail until it does",
            args.users_file.display()
        );
    }
    let credentials = Arc::new(JsonFileStore::new(args.users_file.clone()));

    let notifier: Arc<dyn OtpNotifier> = match args.otp_webhook_url {
        Some(url) => {
            info!("Delivering OTP notifications to {url}");
            Arc::new(WebhookOtpNotifier::new(
                url,
                Duration::from_secs(args.otp_webhook_timeout_seconds),
            )?)
        }
        None => Arc::new(LogOtpNotifier),
    };

    let sessions: Arc<dyn SessionStore> = match &args.dsn {
        Some(dsn) => {
            info!("Using PostgreSQL session store");
            Arc::new(PgSessionStore::connect(dsn.expose_secret()).await?)
        }
        None => {
            warn!("No --dsn given, sessions are kept in memory and lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    let auth_config = AuthConfig::new()
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_challenge_ttl_seconds(args.challenge_ttl_seconds)
        .with_session_cookie_secure(args.cookie_secure)
        .with_landing_path(args.landing_path)
        .with_frontend_base_url(args.frontend_base_url);

    let auth_state = Arc::new(AuthState::new(
        auth_config.clone(),
        Authenticator::new(credentials, notifier),
        SessionIssuer::new(sessions, auth_config.session_ttl()),
    ));

    api::new(args.port, auth_state).await
}
