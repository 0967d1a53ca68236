//! # Gatehouse (session-gated dashboard authentication)
//!
//! `gatehouse` authenticates dashboard operators with a password and an OTP
//! step-up, persists the resulting session server-side, and gates every
//! protected page on that session.
//!
//! ## Sign-in
//!
//! A sign-in is one or two calls to the same credential entry point:
//!
//! - identifier + password: the password is checked and an OTP challenge is
//!   issued. A partial session (`requires_otp = true`) is persisted at once.
//! - identifier + OTP: the OTP is checked and the partial session is upgraded
//!   in place.
//! - identifier + password + OTP in one call completes both factors.
//!
//! ## Route guard
//!
//! Each page declares the roles it accepts. The guard is a pure function of the
//! request context and the page, and answers with either `Allow` or a redirect
//! to `/login`, `/otp` or `/not-found`. Unauthorized users get `/not-found` rather
//! than a forbidden page to avoid advertising which pages exist.

pub mod api;
pub mod auth;
pub mod cli;
pub mod client;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
