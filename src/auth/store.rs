//! Credential store: resolves login identifiers to user records.
//!
//! The file-backed store is read wholesale on every lookup; there is no index
//! and no cache, so edits to the file take effect on the next attempt.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

use super::{
    error::StoreError,
    model::{Identifier, UserRecord},
};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load every user record.
    async fn users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Resolve an identifier to its single matching record.
    ///
    /// # Errors
    /// Returns `StoreError::Ambiguous` when more than one record matches.
    async fn find(&self, identifier: &Identifier) -> Result<Option<UserRecord>, StoreError> {
        let mut matches = self
            .users()
            .await?
            .into_iter()
            .filter(|user| user.matches(identifier));
        let first = matches.next();
        if matches.next().is_some() {
            return Err(StoreError::Ambiguous(identifier.to_string()));
        }
        Ok(first)
    }
}

#[derive(Deserialize)]
struct UsersFile {
    users: Vec<UserRecord>,
}

/// JSON file of the form `{ "users": [ ... ] }`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let path = self.path.display().to_string();
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        let file: UsersFile =
            serde_json::from_str(&data).map_err(|source| StoreError::Parse { path, source })?;
        debug!(users = file.users.len(), "Loaded credential store");
        Ok(file.users)
    }
}

/// Fixed set of records, used by tests and embedding callers.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    users: Vec<UserRecord>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.users.clone())
    }
}
