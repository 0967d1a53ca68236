//! User records, roles and sign-in identifiers.

use regex::Regex;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::AuthError;

/// Role tag carried by a user record and its sessions.
///
/// Unknown tags are kept verbatim so a store can introduce new roles without a
/// code change; pages only ever compare roles for equality.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    SuperAdmin,
    User,
    Client,
    Viewer,
    Editor,
    Moderator,
    Other(String),
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::SuperAdmin => "superAdmin",
            Self::User => "user",
            Self::Client => "client",
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Moderator => "moderator",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => Self::Admin,
            "superAdmin" => Self::SuperAdmin,
            "user" => Self::User,
            "client" => Self::Client,
            "viewer" => Self::Viewer,
            "editor" => Self::Editor,
            "moderator" => Self::Moderator,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login identifier: exactly one of an email address or a phone number.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identifier {
    Email(String),
    Phone(String),
}

impl Identifier {
    /// Normalize and validate an email identifier.
    ///
    /// # Errors
    /// Returns `InvalidIdentifier` when the address is malformed.
    pub fn email(raw: &str) -> Result<Self, AuthError> {
        let normalized = normalize_email(raw);
        if valid_email(&normalized) {
            Ok(Self::Email(normalized))
        } else {
            Err(AuthError::InvalidIdentifier)
        }
    }

    /// Validate a ten digit phone number identifier.
    ///
    /// # Errors
    /// Returns `InvalidIdentifier` when the number is not exactly ten digits.
    pub fn phone(raw: &str) -> Result<Self, AuthError> {
        let trimmed = raw.trim();
        if valid_phone(trimmed) {
            Ok(Self::Phone(trimmed.to_string()))
        } else {
            Err(AuthError::InvalidIdentifier)
        }
    }

    /// Build an identifier from optional form fields; exactly one must be set.
    ///
    /// # Errors
    /// Returns `InvalidIdentifier` when both or neither field is present, or the
    /// present one is malformed.
    pub fn from_parts(email: Option<&str>, phone: Option<&str>) -> Result<Self, AuthError> {
        let email = email.map(str::trim).filter(|value| !value.is_empty());
        let phone = phone.map(str::trim).filter(|value| !value.is_empty());
        match (email, phone) {
            (Some(email), None) => Self::email(email),
            (None, Some(phone)) => Self::phone(phone),
            _ => Err(AuthError::InvalidIdentifier),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Phone(_) => "phone",
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Email(value) | Self::Phone(value) => value,
        }
    }

    /// Rebuild an identifier from its stored `kind` and `value` columns.
    #[must_use]
    pub fn from_stored(kind: &str, value: String) -> Option<Self> {
        match kind {
            "email" => Some(Self::Email(value)),
            "phone" => Some(Self::Phone(value)),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.value())
    }
}

/// A user as held by the credential store.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    #[serde(deserialize_with = "deserialize_secret")]
    pub otp: SecretString,
    pub role: Role,
}

impl UserRecord {
    /// Whether this record answers to the given login identifier.
    #[must_use]
    pub fn matches(&self, identifier: &Identifier) -> bool {
        match identifier {
            Identifier::Email(email) => self
                .email
                .as_deref()
                .is_some_and(|stored| normalize_email(stored) == *email),
            Identifier::Phone(phone) => self
                .phone_number
                .as_deref()
                .is_some_and(|stored| stored.trim() == phone),
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Normalize an email for lookups.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(crate) fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^\d{10}$").is_ok_and(|regex| regex.is_match(phone))
}
