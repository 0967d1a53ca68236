//! Error taxonomy for sign-in and page gating.

use thiserror::Error;

/// Reasons an authentication attempt or a page request is refused.
///
/// All of these are recovered at the call site: rejections are shown to the
/// user, guard failures turn into silent redirects.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum AuthError {
    #[error("invalid identifier")]
    InvalidIdentifier,
    #[error("invalid password")]
    InvalidPassword,
    #[error("invalid otp")]
    InvalidOtp,
    #[error("invalid credentials")]
    InvalidCredentialsShape,
    #[error("session missing")]
    SessionMissing,
    #[error("role not permitted")]
    RoleNotPermitted,
}

impl AuthError {
    const ALL: [Self; 6] = [
        Self::InvalidIdentifier,
        Self::InvalidPassword,
        Self::InvalidOtp,
        Self::InvalidCredentialsShape,
        Self::SessionMissing,
        Self::RoleNotPermitted,
    ];

    /// Inverse of `Display`, for reasons that came back over the wire.
    #[must_use]
    pub fn from_reason(reason: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|error| error.to_string() == reason)
    }
}

/// Failures of the credential store itself, as opposed to bad credentials.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read credential store {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse credential store {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("identifier {0} matches more than one user")]
    Ambiguous(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_reasons_are_stable() {
        assert_eq!(AuthError::InvalidIdentifier.to_string(), "invalid identifier");
        assert_eq!(AuthError::InvalidPassword.to_string(), "invalid password");
        assert_eq!(AuthError::InvalidOtp.to_string(), "invalid otp");
        assert_eq!(
            AuthError::InvalidCredentialsShape.to_string(),
            "invalid credentials"
        );
    }

    #[test]
    fn reasons_parse_back() {
        for error in AuthError::ALL {
            assert_eq!(AuthError::from_reason(&error.to_string()), Some(error));
        }
        assert_eq!(AuthError::from_reason("locked out"), None);
    }
}
