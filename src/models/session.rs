//! Models for the session lifecycle: creation, validation, rotation, stats.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::SessionError;
use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// An authenticated session. One refresh-token hash is valid at a time;
/// rotation replaces it and extends `expires_at`.
pub struct Session {
    /// Opaque unique identifier for the session.
    pub id: String,
    /// User the session belongs to.
    pub user_id: UserId,
    /// SHA-256 hex digest of the currently valid refresh token.
    pub refresh_token_hash: String,
    /// False once the session has been logged out or revoked.
    pub is_active: bool,
    /// Timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent token rotation. Validation is read-only
    /// and leaves this untouched.
    pub last_activity: DateTime<Utc>,
    /// Timestamp after which the session is invalid regardless of `is_active`.
    pub expires_at: DateTime<Utc>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Context captured at login and carried for the session's lifetime.
pub struct SessionMetadata {
    /// How the session was established (currently always "password").
    pub login_method: String,
    /// Whether the user asked for an extended session lifetime.
    pub remember_me: bool,
    /// Role name captured at login, embedded in access tokens.
    pub role_claim: Option<String>,
    /// User agent reported by the client at login.
    pub user_agent: Option<String>,
    /// Client IP recorded at login.
    pub ip_address: Option<String>,
}

impl Session {
    /// Constructs a new active session expiring `ttl` from now.
    pub fn new(
        user_id: UserId,
        refresh_token_hash: String,
        ttl: Duration,
        metadata: SessionMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            refresh_token_hash,
            is_active: true,
            created_at: now,
            last_activity: now,
            expires_at: now + ttl,
            metadata,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A freshly created session together with the one-time plaintext refresh
/// token. The plaintext is never stored and never reproducible.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session: Session,
    pub refresh_token: String,
}

/// Outcome of validating a session by id.
#[derive(Debug)]
pub struct SessionValidation {
    pub is_valid: bool,
    pub session: Option<Session>,
    /// True when the session is in the last stretch of its lifetime and the
    /// client should rotate soon.
    pub needs_refresh: bool,
    pub error: Option<SessionError>,
}

impl SessionValidation {
    pub fn valid(session: Session, needs_refresh: bool) -> Self {
        Self {
            is_valid: true,
            session: Some(session),
            needs_refresh,
            error: None,
        }
    }

    pub fn invalid(error: SessionError) -> Self {
        Self {
            is_valid: false,
            session: None,
            needs_refresh: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Access/refresh token pair handed to clients.
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Input to a refresh-token rotation.
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Result of a successful rotation, including the session identity the
/// caller needs for auditing.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub tokens: TokenPair,
    pub session_id: String,
    pub user_id: UserId,
}

#[derive(Debug, Deserialize, ToSchema)]
/// Payload for `POST /api/auth/revoke`.
pub struct RevokeSessionRequest {
    /// Specific session to revoke; defaults to the caller's own current
    /// session when omitted and `all` is false.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Revoke every session belonging to the caller.
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Aggregate counts over active sessions.
pub struct SessionStats {
    pub total_sessions: i64,
    /// Active session count keyed by user id.
    pub sessions_per_user: HashMap<String, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Public-facing view of a session, without the token hash.
pub struct SessionResponse {
    pub id: String,
    pub user_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub login_method: String,
    pub remember_me: bool,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        SessionResponse {
            id: session.id,
            user_id: session.user_id.to_string(),
            is_active: session.is_active,
            created_at: session.created_at,
            last_activity: session.last_activity,
            expires_at: session.expires_at,
            login_method: session.metadata.login_method,
            remember_me: session.metadata.remember_me,
            user_agent: session.metadata.user_agent,
            ip_address: session.metadata.ip_address,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Response for `GET /api/auth/session`.
pub struct CurrentSessionResponse {
    pub session: SessionResponse,
    pub needs_refresh: bool,
    pub user: crate::models::user::UserResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> SessionMetadata {
        SessionMetadata {
            login_method: "password".to_string(),
            remember_me: false,
            role_claim: None,
            user_agent: None,
            ip_address: None,
        }
    }

    #[test]
    fn new_session_is_active_and_expires_after_ttl() {
        let session = Session::new(
            UserId::new(),
            "hash".to_string(),
            Duration::minutes(15),
            metadata(),
        );
        assert!(session.is_active);
        assert_eq!(session.expires_at - session.created_at, Duration::minutes(15));
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn session_is_expired_at_and_after_expiry() {
        let session = Session::new(
            UserId::new(),
            "hash".to_string(),
            Duration::minutes(15),
            metadata(),
        );
        assert!(session.is_expired(session.expires_at));
        assert!(session.is_expired(session.expires_at + Duration::seconds(1)));
        assert!(!session.is_expired(session.expires_at - Duration::seconds(1)));
    }

    #[test]
    fn session_response_hides_token_hash() {
        let session = Session::new(
            UserId::new(),
            "hash".to_string(),
            Duration::minutes(15),
            metadata(),
        );
        let resp: SessionResponse = session.into();
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("refresh_token_hash").is_none());
        assert_eq!(json["login_method"], "password");
    }

    #[test]
    fn validation_constructors_set_flags() {
        let session = Session::new(
            UserId::new(),
            "hash".to_string(),
            Duration::minutes(15),
            metadata(),
        );
        let ok = SessionValidation::valid(session, true);
        assert!(ok.is_valid);
        assert!(ok.needs_refresh);
        assert!(ok.error.is_none());

        let bad = SessionValidation::invalid(SessionError::SessionInvalid);
        assert!(!bad.is_valid);
        assert!(bad.session.is_none());
        assert!(matches!(bad.error, Some(SessionError::SessionInvalid)));
    }
}
