//! Two-step sign-in wizard as seen from the client.
//!
//! The only thing carried from the password step to the OTP step is the pending
//! identifier, and it only exists in [`FlowState::AwaitingSecondFactor`]. The
//! OTP step cannot be entered any other way.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::{
    authenticator::{AuthOutcome, Authenticator, Credentials},
    guard::HOME_PATH,
    model::{Identifier, Role},
};

/// Where the wizard sends its submissions.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, credentials: Credentials) -> anyhow::Result<AuthOutcome>;
}

#[async_trait]
impl AuthBackend for Authenticator {
    async fn sign_in(&self, credentials: Credentials) -> anyhow::Result<AuthOutcome> {
        Ok(self.authenticate(&credentials).await?)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum FlowState {
    #[default]
    AwaitingPrimaryCredential,
    AwaitingSecondFactor {
        pending: Identifier,
    },
}

/// What the UI should do after a submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FlowStep {
    /// Show the OTP form.
    OtpRequired,
    /// Leave the wizard for the authenticated area.
    Authenticated {
        redirect_to: &'static str,
        role: Role,
    },
    /// Stay on the current step and show the message.
    Rejected { message: String },
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("no pending OTP challenge, sign in again")]
    NoPendingChallenge,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub struct LoginFlow<B> {
    backend: B,
    state: FlowState,
}

impl<B: AuthBackend> LoginFlow<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: FlowState::default(),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Step 1: identifier and password.
    ///
    /// Resubmitting credentials while an OTP is pending starts over.
    ///
    /// # Errors
    /// Returns `FlowError::Backend` when the backend cannot be reached.
    pub async fn submit_credentials(
        &mut self,
        identifier: Identifier,
        password: &str,
    ) -> Result<FlowStep, FlowError> {
        self.state = FlowState::AwaitingPrimaryCredential;
        let credentials = Credentials::new(identifier.clone()).with_password(password);
        let step = match self.backend.sign_in(credentials).await? {
            AuthOutcome::ChallengeRequired { .. } => {
                debug!(%identifier, "Awaiting second factor");
                self.state = FlowState::AwaitingSecondFactor {
                    pending: identifier,
                };
                FlowStep::OtpRequired
            }
            AuthOutcome::Authenticated { role, .. } => FlowStep::Authenticated {
                redirect_to: HOME_PATH,
                role,
            },
            AuthOutcome::Rejected { reason } => FlowStep::Rejected {
                message: reason.to_string(),
            },
        };
        Ok(step)
    }

    /// Step 2: the OTP for the pending identifier.
    ///
    /// # Errors
    /// Returns `FlowError::NoPendingChallenge` unless step 1 ended in a challenge,
    /// or `FlowError::Backend` when the backend cannot be reached.
    pub async fn submit_otp(&mut self, otp: &str) -> Result<FlowStep, FlowError> {
        let FlowState::AwaitingSecondFactor { pending } = &self.state else {
            return Err(FlowError::NoPendingChallenge);
        };
        let credentials = Credentials::new(pending.clone()).with_otp(otp);
        let step = match self.backend.sign_in(credentials).await? {
            AuthOutcome::Authenticated { role, .. } => {
                self.state = FlowState::AwaitingPrimaryCredential;
                FlowStep::Authenticated {
                    redirect_to: HOME_PATH,
                    role,
                }
            }
            AuthOutcome::Rejected { reason } => FlowStep::Rejected {
                message: reason.to_string(),
            },
            AuthOutcome::ChallengeRequired { .. } => FlowStep::OtpRequired,
        };
        Ok(step)
    }

    /// Navigating away: forget the pending identifier.
    pub fn abandon(&mut self) {
        self.state = FlowState::AwaitingPrimaryCredential;
    }
}

impl<B> std::fmt::Debug for LoginFlow<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginFlow")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
