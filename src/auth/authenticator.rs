//! Password and OTP verification.
//!
//! One attempt is one call. The password step never completes a sign-in on
//! its own: a correct password without an OTP always yields
//! `ChallengeRequired`, and the caller has to come back with the OTP.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::{fmt, sync::Arc};
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use super::{
    error::{AuthError, StoreError},
    model::{Identifier, Role, UserRecord},
    otp::OtpNotifier,
    store::CredentialStore,
};

/// Input of a single authentication attempt.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: Identifier,
    pub password: Option<SecretString>,
    pub otp: Option<SecretString>,
}

impl Credentials {
    #[must_use]
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            password: None,
            otp: None,
        }
    }

    /// Attach a password; an empty value counts as no password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = non_empty_secret(password.into());
        self
    }

    /// Attach an OTP; an empty value counts as no OTP.
    #[must_use]
    pub fn with_otp(mut self, otp: impl Into<String>) -> Self {
        self.otp = non_empty_secret(otp.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("otp", &self.otp.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn non_empty_secret(value: String) -> Option<SecretString> {
    if value.is_empty() {
        None
    } else {
        Some(SecretString::from(value))
    }
}

/// Who signed in, as carried by outcomes and sessions.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Identity {
    pub user_id: u64,
    pub name: String,
    pub identifier: Identifier,
}

impl Identity {
    fn from_record(record: &UserRecord, identifier: &Identifier) -> Self {
        Self {
            user_id: record.id,
            name: record.name.clone(),
            identifier: identifier.clone(),
        }
    }
}

/// Result of one authentication attempt. Never persisted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthOutcome {
    Rejected { reason: AuthError },
    ChallengeRequired { identity: Identity },
    Authenticated { identity: Identity, role: Role },
}

impl AuthOutcome {
    fn rejected(reason: AuthError) -> Self {
        Self::Rejected { reason }
    }
}

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn OtpNotifier>,
}

impl Authenticator {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, notifier: Arc<dyn OtpNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Run one authentication attempt.
    ///
    /// # Errors
    /// Returns an error only when the credential store cannot be read; every
    /// credential problem is reported as `AuthOutcome::Rejected`.
    #[instrument(skip_all, fields(identifier = %credentials.identifier))]
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, StoreError> {
        let Some(user) = self.store.find(&credentials.identifier).await? else {
            warn!("Unknown identifier");
            return Ok(AuthOutcome::rejected(AuthError::InvalidIdentifier));
        };
        let identity = Identity::from_record(&user, &credentials.identifier);

        let outcome = match (&credentials.password, &credentials.otp) {
            (Some(password), _) if !secrets_match(password, &user.password) => {
                AuthOutcome::rejected(AuthError::InvalidPassword)
            }
            (Some(_), None) => {
                // Delivery is best effort; the challenge stands either way.
                if let Err(err) = self.notifier.send(&identity).await {
                    warn!("Failed to deliver OTP: {err:#}");
                }
                AuthOutcome::ChallengeRequired { identity }
            }
            (_, Some(otp)) => {
                if secrets_match(otp, &user.otp) {
                    AuthOutcome::Authenticated {
                        identity,
                        role: user.role.clone(),
                    }
                } else {
                    AuthOutcome::rejected(AuthError::InvalidOtp)
                }
            }
            (None, None) => AuthOutcome::rejected(AuthError::InvalidCredentialsShape),
        };

        match &outcome {
            AuthOutcome::Rejected { reason } => warn!(%reason, "Authentication rejected"),
            AuthOutcome::ChallengeRequired { .. } => info!("Password accepted, OTP required"),
            AuthOutcome::Authenticated { role, .. } => info!(%role, "Authenticated"),
        }

        Ok(outcome)
    }
}

/// Exact match of two secrets in constant time.
fn secrets_match(provided: &SecretString, stored: &SecretString) -> bool {
    provided
        .expose_secret()
        .as_bytes()
        .ct_eq(stored.expose_secret().as_bytes())
        .into()
}
