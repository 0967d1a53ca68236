//! Sign-in endpoints.
//!
//! `POST /v1/auth/login` accepts either the password step or the OTP step (or
//! both at once) and answers with the outcome plus a session cookie. The
//! session cookie is also accepted as a bearer token so non-browser clients
//! can reuse the same session.

pub mod login;
pub mod session;
mod state;
pub mod types;

pub use state::{AuthConfig, AuthState};
