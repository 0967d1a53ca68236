//! Authentication core: credential lookup, the password/OTP step-up, session
//! issuance and the per-page route guard.
//!
//! Flow Overview:
//! 1) The credential entry point resolves the identifier through a
//!    [`CredentialStore`].
//! 2) A correct password without an OTP yields `ChallengeRequired`; the OTP is
//!    "sent" through an [`OtpNotifier`] and a partial session is persisted.
//! 3) A correct OTP yields `Authenticated`; the partial session is upgraded in
//!    place, or a full session is created when there was none.
//! 4) Every protected page runs [`guard`] against the request context.
//!
//! Security boundaries:
//! - Passwords and OTP values are compared by exact match and never logged.
//! - Only the SHA-256 of the session token is stored; the raw token lives in
//!   the `HttpOnly` cookie.
//! - There is no lockout or throttling of failed attempts.

pub mod authenticator;
pub mod error;
pub mod flow;
pub mod guard;
pub mod model;
pub mod otp;
pub mod session;
pub mod store;

pub use authenticator::{AuthOutcome, Authenticator, Credentials, Identity};
pub use error::{AuthError, StoreError};
pub use flow::{AuthBackend, FlowError, FlowState, FlowStep, LoginFlow};
pub use guard::{guard, pages, GuardDecision, Page, PageKind, RequestContext};
pub use model::{Identifier, Role, UserRecord};
pub use otp::{LogOtpNotifier, OtpNotifier, WebhookOtpNotifier};
pub use session::{
    MemorySessionStore, PgSessionStore, Session, SessionIssuer, SessionStore, SessionTtl,
};
pub use store::{CredentialStore, JsonFileStore, MemoryCredentialStore};
