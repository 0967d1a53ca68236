//! Server-side sessions.
//!
//! Flow Overview:
//! - A correct password opens a challenge session (`requires_otp = true`) with
//!   a short lifetime.
//! - A correct OTP upgrades that same session in place: the flag is cleared and
//!   the expiry is pushed out to the full lifetime. An OTP without a live
//!   challenge session of the same user opens nothing.
//! - Password and OTP in one call (single-call sign-in) create a full session.
//! - Logout deletes the session. Expired sessions are dropped on read, and
//!   every insert sweeps the ones nobody came back for.
//!
//! Security boundaries: the raw token only ever travels in the cookie; stores
//! are keyed by its SHA-256.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{postgres::PgPoolOptions, Connection, PgPool, Row};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::RwLock;
use tracing::{debug, info, info_span, instrument, Instrument};
use ulid::Ulid;

use super::{
    authenticator::Identity,
    model::{Identifier, Role},
};

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
pub const DEFAULT_CHALLENGE_TTL_SECONDS: i64 = 5 * 60;

const SESSION_SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Session lifetimes in seconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionTtl {
    pub full_seconds: i64,
    pub challenge_seconds: i64,
}

impl Default for SessionTtl {
    fn default() -> Self {
        Self {
            full_seconds: DEFAULT_SESSION_TTL_SECONDS,
            challenge_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub identity: Identity,
    /// Unknown until the second factor is verified.
    pub role: Option<Role>,
    pub requires_otp: bool,
    pub created_at_unix: i64,
    pub expires_at_unix: i64,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at_unix
    }
}

/// A session together with the raw token handed to the client.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, token_hash: &[u8], session: &Session) -> Result<()>;
    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Session>>;
    /// Clear `requires_otp` on an existing session. Returns `false` when the
    /// session is gone.
    async fn complete_otp(&self, token_hash: &[u8], role: &Role, expires_at_unix: i64)
        -> Result<bool>;
    async fn delete(&self, token_hash: &[u8]) -> Result<()>;
    /// Remove every session expired at `now_unix`. Returns how many were removed.
    async fn purge_expired(&self, now_unix: i64) -> Result<u64>;
    /// Reachability check for the health endpoint.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Vec<u8>, Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, token_hash: &[u8], session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(token_hash.to_vec(), session.clone());
        Ok(())
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(token_hash).cloned())
    }

    async fn complete_otp(
        &self,
        token_hash: &[u8],
        role: &Role,
        expires_at_unix: i64,
    ) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(token_hash) else {
            return Ok(false);
        };
        session.requires_otp = false;
        session.role = Some(role.clone());
        session.expires_at_unix = expires_at_unix;
        Ok(true)
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<()> {
        self.sessions.write().await.remove(token_hash);
        Ok(())
    }

    async fn purge_expired(&self, now_unix: i64) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now_unix));
        Ok(u64::try_from(before - sessions.len()).unwrap_or(u64::MAX))
    }
}

/// PostgreSQL-backed store, see `sql/schema.sql`.
#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the `sessions` table exists.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable or the schema cannot be applied.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        sqlx::raw_sql(SESSION_SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to apply session schema")?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, token_hash: &[u8], session: &Session) -> Result<()> {
        let user_id = i64::try_from(session.identity.user_id).context("user id out of range")?;
        let query = r"
            INSERT INTO sessions (
                token_hash, session_id, user_id, user_name, identifier_kind, identifier,
                role, requires_otp, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ";
        sqlx::query(query)
            .bind(token_hash)
            .bind(&session.id)
            .bind(user_id)
            .bind(&session.identity.name)
            .bind(session.identity.identifier.kind())
            .bind(session.identity.identifier.value())
            .bind(session.role.as_ref().map(Role::as_str))
            .bind(session.requires_otp)
            .bind(session.created_at_unix)
            .bind(session.expires_at_unix)
            .execute(&self.pool)
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Session>> {
        let query = r"
            SELECT session_id, user_id, user_name, identifier_kind, identifier,
                   role, requires_otp, created_at, expires_at
            FROM sessions
            WHERE token_hash = $1
        ";
        let Some(row) = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .context("failed to lookup session")?
        else {
            return Ok(None);
        };

        let kind: String = row.try_get("identifier_kind")?;
        let Some(identifier) = Identifier::from_stored(&kind, row.try_get("identifier")?) else {
            return Ok(None);
        };
        let user_id: i64 = row.try_get("user_id")?;
        let role: Option<String> = row.try_get("role")?;

        Ok(Some(Session {
            id: row.try_get("session_id")?,
            identity: Identity {
                user_id: u64::try_from(user_id).context("negative user id")?,
                name: row.try_get("user_name")?,
                identifier,
            },
            role: role.map(Role::from),
            requires_otp: row.try_get("requires_otp")?,
            created_at_unix: row.try_get("created_at")?,
            expires_at_unix: row.try_get("expires_at")?,
        }))
    }

    async fn complete_otp(
        &self,
        token_hash: &[u8],
        role: &Role,
        expires_at_unix: i64,
    ) -> Result<bool> {
        let query = r"
            UPDATE sessions
            SET requires_otp = FALSE, role = $2, expires_at = $3
            WHERE token_hash = $1
        ";
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(role.as_str())
            .bind(expires_at_unix)
            .execute(&self.pool)
            .await
            .context("failed to update session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn purge_expired(&self, now_unix: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now_unix)
            .execute(&self.pool)
            .await
            .context("failed to purge expired sessions")?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("Failed to acquire database connection")?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("Failed to ping database")
    }
}

/// Creates, upgrades, reads and destroys sessions on top of a [`SessionStore`].
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn SessionStore>,
    ttl: SessionTtl,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, ttl: SessionTtl) -> Self {
        Self { store, ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> SessionTtl {
        self.ttl
    }

    /// Persist a challenge session right after the password step.
    ///
    /// Any session behind `current_token` is discarded first.
    ///
    /// # Errors
    /// Returns an error if token generation or the store fails.
    #[instrument(skip_all, fields(user_id = identity.user_id))]
    pub async fn start_challenge(
        &self,
        current_token: Option<&str>,
        identity: Identity,
    ) -> Result<IssuedSession> {
        if let Some(token) = current_token {
            self.revoke(token).await?;
        }
        self.insert(identity, None, true, self.ttl.challenge_seconds)
            .await
    }

    /// Upgrade the challenge session behind `current_token` after a correct OTP.
    ///
    /// Returns `None`, and touches nothing, unless the token names a live
    /// challenge session of the same user.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    #[instrument(skip_all, fields(user_id = identity.user_id))]
    pub async fn upgrade_challenge(
        &self,
        current_token: Option<&str>,
        identity: &Identity,
        role: Role,
    ) -> Result<Option<IssuedSession>> {
        let Some(token) = current_token else {
            return Ok(None);
        };
        let token_hash = hash_session_token(token);
        let Some(mut session) = self.live_session(&token_hash).await? else {
            return Ok(None);
        };
        if !session.requires_otp || session.identity.user_id != identity.user_id {
            return Ok(None);
        }

        let expires_at_unix = now_unix() + self.ttl.full_seconds;
        if !self
            .store
            .complete_otp(&token_hash, &role, expires_at_unix)
            .await?
        {
            return Ok(None);
        }
        session.requires_otp = false;
        session.role = Some(role);
        session.expires_at_unix = expires_at_unix;
        info!(session_id = %session.id, "Challenge session upgraded");
        Ok(Some(IssuedSession {
            token: token.to_string(),
            session,
        }))
    }

    /// Record a sign-in that proved both factors in one call.
    ///
    /// A live challenge session of the same user behind `current_token` is
    /// upgraded in place; otherwise a new full session is created and the old
    /// one, if any, is discarded.
    ///
    /// # Errors
    /// Returns an error if token generation or the store fails.
    #[instrument(skip_all, fields(user_id = identity.user_id))]
    pub async fn complete(
        &self,
        current_token: Option<&str>,
        identity: Identity,
        role: Role,
    ) -> Result<IssuedSession> {
        if let Some(issued) = self
            .upgrade_challenge(current_token, &identity, role.clone())
            .await?
        {
            return Ok(issued);
        }
        if let Some(token) = current_token {
            self.revoke(token).await?;
        }
        self.insert(identity, Some(role), false, self.ttl.full_seconds)
            .await
    }

    /// Resolve a token to its live session.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn current(&self, token: &str) -> Result<Option<Session>> {
        self.live_session(&hash_session_token(token)).await
    }

    /// # Errors
    /// Returns an error if the backing store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Destroy the session behind `token`, if any.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.store.delete(&hash_session_token(token)).await
    }

    async fn live_session(&self, token_hash: &[u8]) -> Result<Option<Session>> {
        match self.store.lookup(token_hash).await? {
            Some(session) if session.is_expired(now_unix()) => {
                debug!(session_id = %session.id, "Dropping expired session");
                self.store.delete(token_hash).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn insert(
        &self,
        identity: Identity,
        role: Option<Role>,
        requires_otp: bool,
        ttl_seconds: i64,
    ) -> Result<IssuedSession> {
        let token = generate_session_token()?;
        let now = now_unix();
        let purged = self.store.purge_expired(now).await?;
        if purged > 0 {
            debug!(purged, "Swept expired sessions");
        }
        let session = Session {
            id: Ulid::new().to_string(),
            identity,
            role,
            requires_otp,
            created_at_unix: now,
            expires_at_unix: now + ttl_seconds,
        };
        self.store
            .insert(&hash_session_token(&token), &session)
            .await?;
        info!(session_id = %session.id, requires_otp, "Session created");
        Ok(IssuedSession { token, session })
    }
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; stores keep a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never reach the store.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user_id: u64) -> anyhow::Result<Identity> {
        Ok(Identity {
            user_id,
            name: format!("user {user_id}"),
            identifier: Identifier::email(&format!("u{user_id}@x.com"))?,
        })
    }

    fn issuer(ttl: SessionTtl) -> (SessionIssuer, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        (SessionIssuer::new(store.clone(), ttl), store)
    }

    #[test]
    fn session_tokens_are_random_and_hashed() -> anyhow::Result<()> {
        let first = generate_session_token()?;
        let second = generate_session_token()?;
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert_eq!(hash_session_token(&first).len(), 32);
        assert_eq!(hash_session_token(&first), hash_session_token(&first));
        Ok(())
    }

    #[tokio::test]
    async fn challenge_session_is_upgraded_in_place() -> anyhow::Result<()> {
        let (issuer, store) = issuer(SessionTtl::default());
        let challenge = issuer.start_challenge(None, identity(1)?).await?;
        assert!(challenge.session.requires_otp);
        assert_eq!(challenge.session.role, None);

        let full = issuer
            .complete(Some(&challenge.token), identity(1)?, Role::Admin)
            .await?;
        assert_eq!(full.token, challenge.token);
        assert_eq!(full.session.id, challenge.session.id);
        assert!(!full.session.requires_otp);
        assert_eq!(store.len().await, 1);

        let current = issuer.current(&full.token).await?;
        assert_eq!(current.as_ref().map(|s| s.requires_otp), Some(false));
        assert_eq!(current.and_then(|s| s.role), Some(Role::Admin));
        Ok(())
    }

    #[tokio::test]
    async fn completion_without_challenge_creates_full_session() -> anyhow::Result<()> {
        let (issuer, store) = issuer(SessionTtl::default());
        let issued = issuer.complete(None, identity(2)?, Role::User).await?;
        assert!(!issued.session.requires_otp);
        assert_eq!(
            issued.session.expires_at_unix - issued.session.created_at_unix,
            DEFAULT_SESSION_TTL_SECONDS
        );
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn completion_for_another_user_replaces_the_session() -> anyhow::Result<()> {
        let (issuer, store) = issuer(SessionTtl::default());
        let challenge = issuer.start_challenge(None, identity(1)?).await?;
        let other = issuer
            .complete(Some(&challenge.token), identity(2)?, Role::User)
            .await?;
        assert_ne!(other.token, challenge.token);
        assert!(issuer.current(&challenge.token).await?.is_none());
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped_on_read() -> anyhow::Result<()> {
        let (issuer, store) = issuer(SessionTtl {
            full_seconds: 0,
            challenge_seconds: 0,
        });
        let issued = issuer.start_challenge(None, identity(1)?).await?;
        assert!(issuer.current(&issued.token).await?.is_none());
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn otp_upgrade_needs_a_challenge_of_the_same_user() -> anyhow::Result<()> {
        let (issuer, store) = issuer(SessionTtl::default());
        assert!(issuer
            .upgrade_challenge(None, &identity(1)?, Role::Admin)
            .await?
            .is_none());
        assert!(issuer
            .upgrade_challenge(Some("unknown"), &identity(1)?, Role::Admin)
            .await?
            .is_none());

        let challenge = issuer.start_challenge(None, identity(1)?).await?;
        assert!(issuer
            .upgrade_challenge(Some(&challenge.token), &identity(2)?, Role::User)
            .await?
            .is_none());
        let current = issuer.current(&challenge.token).await?;
        assert_eq!(current.map(|s| s.requires_otp), Some(true));

        let full = issuer.complete(None, identity(1)?, Role::Admin).await?;
        assert!(issuer
            .upgrade_challenge(Some(&full.token), &identity(1)?, Role::Admin)
            .await?
            .is_none());
        assert_eq!(store.len().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn inserts_sweep_abandoned_sessions() -> anyhow::Result<()> {
        let store = Arc::new(MemorySessionStore::new());
        let short = SessionIssuer::new(
            store.clone(),
            SessionTtl {
                full_seconds: 0,
                challenge_seconds: 0,
            },
        );
        for user_id in 1..=3 {
            short.start_challenge(None, identity(user_id)?).await?;
        }
        assert_eq!(store.len().await, 1);

        let issuer = SessionIssuer::new(store.clone(), SessionTtl::default());
        let kept = issuer.start_challenge(None, identity(4)?).await?;
        assert_eq!(store.len().await, 1);
        assert!(issuer.current(&kept.token).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn purge_keeps_live_sessions() -> anyhow::Result<()> {
        let (issuer, store) = issuer(SessionTtl::default());
        issuer.start_challenge(None, identity(1)?).await?;
        assert_eq!(store.purge_expired(now_unix()).await?, 0);
        assert_eq!(
            store
                .purge_expired(now_unix() + DEFAULT_CHALLENGE_TTL_SECONDS)
                .await?,
            1
        );
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_destroys_the_session() -> anyhow::Result<()> {
        let (issuer, store) = issuer(SessionTtl::default());
        let issued = issuer.complete(None, identity(1)?, Role::Admin).await?;
        issuer.revoke(&issued.token).await?;
        assert!(issuer.current(&issued.token).await?.is_none());
        assert!(store.is_empty().await);
        Ok(())
    }
}
