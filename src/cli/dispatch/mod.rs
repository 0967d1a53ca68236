//! Maps parsed CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, ARG_DSN, ARG_PORT, ARG_USERS_FILE};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let users_file = matches
        .get_one::<String>(ARG_USERS_FILE)
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .context("missing required argument: --users-file")?;
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .filter(|dsn| !dsn.trim().is_empty())
        .cloned()
        .map(SecretString::from);

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        users_file,
        dsn,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        challenge_ttl_seconds: auth_opts.challenge_ttl_seconds,
        cookie_secure: auth_opts.cookie_secure,
        landing_path: auth_opts.landing_path,
        frontend_base_url: auth_opts.frontend_base_url,
        otp_webhook_url: auth_opts.otp_webhook_url,
        otp_webhook_timeout_seconds: auth_opts.otp_webhook_timeout_seconds,
    }))
}
