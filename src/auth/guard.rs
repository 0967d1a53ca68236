//! Per-request route guard.
//!
//! The guard holds no state. Handlers build a [`RequestContext`] once per
//! request (the session behind the cookie, if any) and pass it in together with
//! the page being requested.

use serde::Serialize;

use super::{error::AuthError, model::Role, session::Session};

pub const LOGIN_PATH: &str = "/login";
pub const OTP_PATH: &str = "/otp";
pub const HOME_PATH: &str = "/home";
pub const NOT_FOUND_PATH: &str = "/not-found";

/// What a page requires from the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PageKind {
    /// Open to everyone.
    Public,
    /// The sign-in page; only useful without a session.
    Login,
    /// The OTP entry page; only useful while the second factor is outstanding.
    Otp,
    /// Requires a fully authenticated session. An empty role list accepts any role.
    Protected { roles: Vec<Role> },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page {
    pub path: &'static str,
    pub title: &'static str,
    pub kind: PageKind,
}

impl Page {
    #[must_use]
    pub fn protected(path: &'static str, title: &'static str, roles: &[Role]) -> Self {
        Self {
            path,
            title,
            kind: PageKind::Protected {
                roles: roles.to_vec(),
            },
        }
    }
}

/// Dashboard pages and their requirements.
#[must_use]
pub fn pages() -> Vec<Page> {
    vec![
        Page {
            path: LOGIN_PATH,
            title: "Login",
            kind: PageKind::Login,
        },
        Page {
            path: OTP_PATH,
            title: "OTP Verification",
            kind: PageKind::Otp,
        },
        Page {
            path: NOT_FOUND_PATH,
            title: "Not Found",
            kind: PageKind::Public,
        },
        Page::protected(HOME_PATH, "Home", &[]),
        Page::protected("/dashboard", "Dashboard", &[]),
        Page::protected("/change-password", "Change Password", &[]),
        Page::protected("/apps/user", "Users", &[Role::Admin]),
        Page::protected("/apps/permissions", "Permissions", &[Role::Admin]),
        Page::protected("/apps/settings", "Settings", &[Role::Admin]),
        Page::protected("/roles", "Roles", &[Role::Admin]),
    ]
}

/// Everything the guard may look at for one request.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub session: Option<Session>,
}

impl RequestContext {
    #[must_use]
    pub fn new(session: Option<Session>) -> Self {
        Self { session }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum GuardDecision {
    Allow,
    RedirectTo(&'static str),
}

impl GuardDecision {
    /// The refusal behind a redirect, for logging. Redirects away from the login
    /// and OTP pages are not refusals.
    #[must_use]
    pub fn cause(&self) -> Option<AuthError> {
        match self {
            Self::RedirectTo(LOGIN_PATH) => Some(AuthError::SessionMissing),
            Self::RedirectTo(NOT_FOUND_PATH) => Some(AuthError::RoleNotPermitted),
            _ => None,
        }
    }
}

/// Decide whether `page` may be rendered for `context`.
#[must_use]
pub fn guard(context: &RequestContext, page: &Page) -> GuardDecision {
    let session = context.session.as_ref();
    match &page.kind {
        PageKind::Public => GuardDecision::Allow,
        PageKind::Login => match session {
            None => GuardDecision::Allow,
            Some(session) if session.requires_otp => GuardDecision::RedirectTo(OTP_PATH),
            Some(_) => GuardDecision::RedirectTo(HOME_PATH),
        },
        PageKind::Otp => match session {
            None => GuardDecision::RedirectTo(LOGIN_PATH),
            Some(session) if session.requires_otp => GuardDecision::Allow,
            Some(_) => GuardDecision::RedirectTo(HOME_PATH),
        },
        PageKind::Protected { roles } => {
            let Some(session) = session else {
                return GuardDecision::RedirectTo(LOGIN_PATH);
            };
            if session.requires_otp {
                return GuardDecision::RedirectTo(OTP_PATH);
            }
            let permitted = roles.is_empty()
                || session
                    .role
                    .as_ref()
                    .is_some_and(|role| roles.contains(role));
            if permitted {
                GuardDecision::Allow
            } else {
                GuardDecision::RedirectTo(NOT_FOUND_PATH)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{authenticator::Identity, model::Identifier};
    use anyhow::Result;

    fn session(requires_otp: bool, role: Option<Role>) -> Result<Session> {
        Ok(Session {
            id: "01J00000000000000000000000".to_string(),
            identity: Identity {
                user_id: 1,
                name: "A".to_string(),
                identifier: Identifier::email("a@x.com")?,
            },
            role,
            requires_otp,
            created_at_unix: 0,
            expires_at_unix: i64::MAX,
        })
    }

    fn page(path: &str) -> Result<Page> {
        pages()
            .into_iter()
            .find(|page| page.path == path)
            .ok_or_else(|| anyhow::anyhow!("unknown page {path}"))
    }

    fn protected_pages() -> Vec<Page> {
        pages()
            .into_iter()
            .filter(|page| matches!(page.kind, PageKind::Protected { .. }))
            .collect()
    }

    #[test]
    fn no_session_redirects_protected_pages_to_login() {
        let context = RequestContext::new(None);
        for page in protected_pages() {
            assert_eq!(
                guard(&context, &page),
                GuardDecision::RedirectTo(LOGIN_PATH),
                "{}",
                page.path
            );
        }
    }

    #[test]
    fn pending_otp_redirects_everything_but_the_otp_page() -> Result<()> {
        let context = RequestContext::new(Some(session(true, None)?));
        for page in protected_pages() {
            assert_eq!(guard(&context, &page), GuardDecision::RedirectTo(OTP_PATH));
        }
        assert_eq!(guard(&context, &page(LOGIN_PATH)?), GuardDecision::RedirectTo(OTP_PATH));
        assert_eq!(guard(&context, &page(OTP_PATH)?), GuardDecision::Allow);
        Ok(())
    }

    #[test]
    fn role_outside_the_allowed_set_gets_not_found() -> Result<()> {
        let context = RequestContext::new(Some(session(false, Some(Role::User))?));
        let decision = guard(&context, &page("/apps/user")?);
        assert_eq!(decision, GuardDecision::RedirectTo(NOT_FOUND_PATH));
        assert_eq!(decision.cause(), Some(AuthError::RoleNotPermitted));
        assert_eq!(guard(&context, &page("/dashboard")?), GuardDecision::Allow);
        Ok(())
    }

    #[test]
    fn admin_reaches_admin_pages() -> Result<()> {
        let context = RequestContext::new(Some(session(false, Some(Role::Admin))?));
        for page in protected_pages() {
            assert_eq!(guard(&context, &page), GuardDecision::Allow);
        }
        Ok(())
    }

    #[test]
    fn signed_in_users_are_sent_home_from_login_and_otp() -> Result<()> {
        let context = RequestContext::new(Some(session(false, Some(Role::Client))?));
        assert_eq!(guard(&context, &page(LOGIN_PATH)?), GuardDecision::RedirectTo(HOME_PATH));
        assert_eq!(guard(&context, &page(OTP_PATH)?), GuardDecision::RedirectTo(HOME_PATH));
        Ok(())
    }

    #[test]
    fn otp_page_without_session_redirects_to_login() -> Result<()> {
        let context = RequestContext::default();
        let decision = guard(&context, &page(OTP_PATH)?);
        assert_eq!(decision, GuardDecision::RedirectTo(LOGIN_PATH));
        assert_eq!(decision.cause(), Some(AuthError::SessionMissing));
        assert_eq!(guard(&context, &page(NOT_FOUND_PATH)?), GuardDecision::Allow);
        assert_eq!(guard(&context, &page(LOGIN_PATH)?), GuardDecision::Allow);
        Ok(())
    }
}
