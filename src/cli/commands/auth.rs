use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use url::Url;

use crate::auth::{
    guard::LOGIN_PATH,
    session::{DEFAULT_CHALLENGE_TTL_SECONDS, DEFAULT_SESSION_TTL_SECONDS},
};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_CHALLENGE_TTL_SECONDS: &str = "challenge-ttl-seconds";
pub const ARG_INSECURE_COOKIE: &str = "insecure-cookie";
pub const ARG_LANDING_PATH: &str = "landing-path";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_OTP_WEBHOOK_URL: &str = "otp-webhook-url";
pub const ARG_OTP_WEBHOOK_TIMEOUT_SECONDS: &str = "otp-webhook-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub session_ttl_seconds: i64,
    pub challenge_ttl_seconds: i64,
    pub cookie_secure: bool,
    pub landing_path: String,
    pub frontend_base_url: Option<String>,
    pub otp_webhook_url: Option<Url>,
    pub otp_webhook_timeout_seconds: u64,
}

impl Options {
    /// Parse session and OTP delivery arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the OTP webhook URL is not a valid URL.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let otp_webhook_url = get_non_empty(ARG_OTP_WEBHOOK_URL)
            .map(|url| {
                Url::parse(&url).with_context(|| format!("invalid --{ARG_OTP_WEBHOOK_URL}: {url}"))
            })
            .transpose()?;

        Ok(Self {
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
            challenge_ttl_seconds: matches
                .get_one::<i64>(ARG_CHALLENGE_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_CHALLENGE_TTL_SECONDS),
            cookie_secure: !matches.get_flag(ARG_INSECURE_COOKIE),
            landing_path: get_non_empty(ARG_LANDING_PATH)
                .unwrap_or_else(|| LOGIN_PATH.to_string()),
            frontend_base_url: get_non_empty(ARG_FRONTEND_BASE_URL),
            otp_webhook_url,
            otp_webhook_timeout_seconds: matches
                .get_one::<u64>(ARG_OTP_WEBHOOK_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(5),
        })
    }
}

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_otp_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Lifetime of a fully authenticated session in seconds")
                .env("GATEHOUSE_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_TTL_SECONDS)
                .long(ARG_CHALLENGE_TTL_SECONDS)
                .help("Lifetime of a session waiting for its OTP in seconds")
                .env("GATEHOUSE_CHALLENGE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_INSECURE_COOKIE)
                .long(ARG_INSECURE_COOKIE)
                .help("Drop the Secure attribute from the session cookie (plain HTTP development)")
                .env("GATEHOUSE_INSECURE_COOKIE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_LANDING_PATH)
                .long(ARG_LANDING_PATH)
                .help("Where logout redirects to")
                .env("GATEHOUSE_LANDING_PATH")
                .default_value(LOGIN_PATH),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend origin allowed to call the API with credentials (CORS)")
                .env("GATEHOUSE_FRONTEND_BASE_URL"),
        )
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_WEBHOOK_URL)
                .long(ARG_OTP_WEBHOOK_URL)
                .help("POST OTP delivery requests to this URL instead of logging them")
                .env("GATEHOUSE_OTP_WEBHOOK_URL"),
        )
        .arg(
            Arg::new(ARG_OTP_WEBHOOK_TIMEOUT_SECONDS)
                .long(ARG_OTP_WEBHOOK_TIMEOUT_SECONDS)
                .help("Timeout for the OTP webhook request in seconds")
                .env("GATEHOUSE_OTP_WEBHOOK_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        with_args(Command::new("gatehouse"))
    }

    #[test]
    fn defaults() -> Result<()> {
        temp_env::with_vars(
            [
                ("GATEHOUSE_SESSION_TTL_SECONDS", None::<&str>),
                ("GATEHOUSE_CHALLENGE_TTL_SECONDS", None),
                ("GATEHOUSE_INSECURE_COOKIE", None),
                ("GATEHOUSE_LANDING_PATH", None),
                ("GATEHOUSE_FRONTEND_BASE_URL", None),
                ("GATEHOUSE_OTP_WEBHOOK_URL", None),
            ],
            || {
                let matches = command().try_get_matches_from(["gatehouse"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.session_ttl_seconds, DEFAULT_SESSION_TTL_SECONDS);
                assert_eq!(options.challenge_ttl_seconds, DEFAULT_CHALLENGE_TTL_SECONDS);
                assert!(options.cookie_secure);
                assert_eq!(options.landing_path, LOGIN_PATH);
                assert!(options.frontend_base_url.is_none());
                assert!(options.otp_webhook_url.is_none());
                Ok(())
            },
        )
    }

    #[test]
    fn env_overrides() -> Result<()> {
        temp_env::with_vars(
            [
                ("GATEHOUSE_SESSION_TTL_SECONDS", Some("3600")),
                ("GATEHOUSE_CHALLENGE_TTL_SECONDS", Some("60")),
                ("GATEHOUSE_INSECURE_COOKIE", Some("true")),
                ("GATEHOUSE_OTP_WEBHOOK_URL", Some("http://notify.local/otp")),
            ],
            || {
                let matches = command().try_get_matches_from(["gatehouse"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.session_ttl_seconds, 3600);
                assert_eq!(options.challenge_ttl_seconds, 60);
                assert!(!options.cookie_secure);
                assert_eq!(
                    options.otp_webhook_url.map(String::from).as_deref(),
                    Some("http://notify.local/otp")
                );
                Ok(())
            },
        )
    }

    #[test]
    fn invalid_webhook_url_is_rejected() -> Result<()> {
        temp_env::with_vars([("GATEHOUSE_OTP_WEBHOOK_URL", None::<&str>)], || {
            let matches =
                command().try_get_matches_from(["gatehouse", "--otp-webhook-url", "not a url"])?;
            assert!(Options::parse(&matches).is_err());
            Ok(())
        })
    }

    #[test]
    fn zero_ttl_is_rejected() {
        temp_env::with_vars([("GATEHOUSE_SESSION_TTL_SECONDS", None::<&str>)], || {
            let result =
                command().try_get_matches_from(["gatehouse", "--session-ttl-seconds", "0"]);
            assert!(result.is_err());
        });
    }
}
