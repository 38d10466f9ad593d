use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::SessionError;
use crate::models::session::{
    CreatedSession, RefreshGrant, Session, SessionMetadata, SessionStats, SessionValidation,
    TokenPair,
};
use crate::repositories::session as session_repo;
use crate::services::token_issuer::TokenIssuer;
use crate::types::UserId;
use crate::utils::token::hash_refresh_token;

/// Storage port for sessions. Implementations must make
/// `rotate_refresh_token` an atomic compare-and-swap on the current token
/// hash: with concurrent rotations of the same token, exactly one caller
/// gets the updated session and the rest get `None`.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn insert(&self, session: Session) -> anyhow::Result<()>;
    async fn get(&self, session_id: &str) -> anyhow::Result<Option<Session>>;
    async fn find_active_by_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>>;
    async fn rotate_refresh_token(
        &self,
        current_hash: &str,
        new_hash: &str,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>>;
    /// Marks a session inactive. Returns false when it was already inactive
    /// or absent.
    async fn deactivate(&self, session_id: &str) -> anyhow::Result<bool>;
    async fn deactivate_user_sessions(&self, user_id: &UserId) -> anyhow::Result<u64>;
    async fn stats(&self, now: DateTime<Utc>) -> anyhow::Result<SessionStats>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;
}

/// Process-local backend holding sessions in a map. Used by tests and
/// single-process deployments; rotation serializes on the write lock.
#[derive(Default)]
pub struct MemorySessionBackend {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn insert(&self, session: Session) -> anyhow::Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> anyhow::Result<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn find_active_by_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.refresh_token_hash == token_hash && s.is_active && !s.is_expired(now))
            .cloned())
    }

    async fn rotate_refresh_token(
        &self,
        current_hash: &str,
        new_hash: &str,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions
            .values_mut()
            .find(|s| s.refresh_token_hash == current_hash && s.is_active && !s.is_expired(now))
        else {
            return Ok(None);
        };
        session.refresh_token_hash = new_hash.to_string();
        session.last_activity = last_activity;
        session.expires_at = expires_at;
        Ok(Some(session.clone()))
    }

    async fn deactivate(&self, session_id: &str) -> anyhow::Result<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) if session.is_active => {
                session.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_user_sessions(&self, user_id: &UserId) -> anyhow::Result<u64> {
        let mut sessions = self.sessions.write().await;
        let mut count = 0;
        for session in sessions
            .values_mut()
            .filter(|s| s.user_id == *user_id && s.is_active)
        {
            session.is_active = false;
            count += 1;
        }
        Ok(count)
    }

    async fn stats(&self, now: DateTime<Utc>) -> anyhow::Result<SessionStats> {
        let sessions = self.sessions.read().await;
        let mut sessions_per_user: HashMap<String, i64> = HashMap::new();
        let mut total_sessions = 0;
        for session in sessions.values().filter(|s| s.is_active && !s.is_expired(now)) {
            *sessions_per_user
                .entry(session.user_id.to_string())
                .or_insert(0) += 1;
            total_sessions += 1;
        }
        Ok(SessionStats {
            total_sessions,
            sessions_per_user,
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.is_active && !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// Postgres-backed session storage. Rotation relies on the conditional
/// UPDATE in the repository for its compare-and-swap.
pub struct PgSessionBackend {
    pool: PgPool,
}

impl PgSessionBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionBackend for PgSessionBackend {
    async fn insert(&self, session: Session) -> anyhow::Result<()> {
        session_repo::insert_session(&self.pool, &session).await?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> anyhow::Result<Option<Session>> {
        Ok(session_repo::find_session_by_id(&self.pool, session_id).await?)
    }

    async fn find_active_by_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>> {
        Ok(session_repo::find_active_session_by_token_hash(&self.pool, token_hash, now).await?)
    }

    async fn rotate_refresh_token(
        &self,
        current_hash: &str,
        new_hash: &str,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>> {
        Ok(session_repo::rotate_session_tokens(
            &self.pool,
            current_hash,
            new_hash,
            last_activity,
            expires_at,
            now,
        )
        .await?)
    }

    async fn deactivate(&self, session_id: &str) -> anyhow::Result<bool> {
        Ok(session_repo::deactivate_session(&self.pool, session_id).await?)
    }

    async fn deactivate_user_sessions(&self, user_id: &UserId) -> anyhow::Result<u64> {
        Ok(session_repo::deactivate_user_sessions(&self.pool, user_id).await?)
    }

    async fn stats(&self, now: DateTime<Utc>) -> anyhow::Result<SessionStats> {
        let rows = session_repo::count_active_sessions_per_user(&self.pool, now).await?;
        let total_sessions = rows.iter().map(|(_, count)| count).sum();
        let sessions_per_user = rows.into_iter().collect();
        Ok(SessionStats {
            total_sessions,
            sessions_per_user,
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        Ok(session_repo::purge_sessions(&self.pool, now).await?)
    }
}

/// Owns the session lifecycle. All session state flows through here; the
/// storage backend is injected.
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    issuer: TokenIssuer,
    session_ttl: Duration,
    remember_me_ttl: Duration,
    refresh_threshold_percent: i64,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, issuer: TokenIssuer, config: &Config) -> Self {
        Self {
            backend,
            issuer,
            session_ttl: Duration::minutes(config.session_ttl_minutes),
            remember_me_ttl: Duration::days(config.remember_me_ttl_days),
            refresh_threshold_percent: config.refresh_threshold_percent,
        }
    }

    fn ttl_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.remember_me_ttl
        } else {
            self.session_ttl
        }
    }

    /// Creates a session and returns it with the one-time plaintext refresh
    /// token. The TTL depends on the remember-me flag in the metadata.
    pub async fn create_session(
        &self,
        user_id: UserId,
        metadata: SessionMetadata,
    ) -> anyhow::Result<CreatedSession> {
        let secret = self.issuer.issue_refresh_token();
        let ttl = self.ttl_for(metadata.remember_me);
        let session = Session::new(user_id, secret.hash, ttl, metadata);
        self.backend.insert(session.clone()).await?;

        tracing::debug!(session_id = %session.id, user_id = %session.user_id, "Session created");
        Ok(CreatedSession {
            session,
            refresh_token: secret.value,
        })
    }

    /// Checks a session by id. Absent, deactivated, and expired sessions all
    /// come back invalid; `needs_refresh` is set once the remaining lifetime
    /// drops under the configured percentage of the full TTL.
    pub async fn validate_session(&self, session_id: &str) -> anyhow::Result<SessionValidation> {
        let Some(session) = self.backend.get(session_id).await? else {
            return Ok(SessionValidation::invalid(SessionError::SessionInvalid));
        };

        let now = Utc::now();
        if !session.is_active || session.is_expired(now) {
            return Ok(SessionValidation::invalid(SessionError::SessionInvalid));
        }

        let full_ttl = self.ttl_for(session.metadata.remember_me);
        let threshold = full_ttl * (self.refresh_threshold_percent as i32) / 100;
        let needs_refresh = session.expires_at - now < threshold;

        Ok(SessionValidation::valid(session, needs_refresh))
    }

    /// Rotates the refresh token. Single-use: once a rotation lands, the old
    /// value is dead with no grace window. Concurrent calls with the same
    /// token produce exactly one winner; losers see `InvalidRefreshToken`.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<RefreshGrant, SessionError> {
        let token_hash = hash_refresh_token(refresh_token);
        let now = Utc::now();

        let current = self
            .backend
            .find_active_by_token_hash(&token_hash, now)
            .await
            .map_err(SessionError::TokenRefreshFailed)?;
        let Some(current) = current else {
            tracing::debug!("Refresh token does not match an active session");
            return Err(SessionError::InvalidRefreshToken);
        };

        let ttl = self.ttl_for(current.metadata.remember_me);
        let secret = self.issuer.issue_refresh_token();
        let rotated = self
            .backend
            .rotate_refresh_token(&token_hash, &secret.hash, now, now + ttl, now)
            .await
            .map_err(SessionError::TokenRefreshFailed)?;
        let Some(session) = rotated else {
            // Lost the race against a concurrent rotation of the same token.
            tracing::debug!(session_id = %current.id, "Refresh token rotation found no matching row");
            return Err(SessionError::InvalidRefreshToken);
        };

        let (access_token, _) = self
            .issuer
            .issue_access_token(
                &session.user_id,
                session.metadata.role_claim.as_deref(),
                &session.id,
            )
            .map_err(SessionError::TokenRefreshFailed)?;

        tracing::debug!(session_id = %session.id, "Refresh tokens rotated");
        Ok(RefreshGrant {
            tokens: TokenPair {
                access_token,
                refresh_token: secret.value,
                expires_in: self.issuer.access_token_ttl_seconds(),
            },
            session_id: session.id,
            user_id: session.user_id,
        })
    }

    /// Deactivates a session. Idempotent: unknown or already-inactive
    /// sessions are a no-op.
    pub async fn invalidate_session(&self, session_id: &str) -> anyhow::Result<()> {
        let deactivated = self.backend.deactivate(session_id).await?;
        if deactivated {
            tracing::debug!(session_id, "Session invalidated");
        }
        Ok(())
    }

    /// Deactivates every active session of a user, returning how many.
    pub async fn invalidate_user_sessions(&self, user_id: &UserId) -> anyhow::Result<u64> {
        let count = self.backend.deactivate_user_sessions(user_id).await?;
        tracing::debug!(%user_id, count, "User sessions invalidated");
        Ok(count)
    }

    pub async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<Session>> {
        self.backend.get(session_id).await
    }

    pub async fn get_stats(&self) -> anyhow::Result<SessionStats> {
        self.backend.stats(Utc::now()).await
    }

    /// Removes expired and deactivated sessions from storage.
    pub async fn purge_expired(&self) -> anyhow::Result<u64> {
        self.backend.purge_expired(Utc::now()).await
    }
}
