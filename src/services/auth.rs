use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::{AppError, AuthError, SessionError};
use crate::models::session::{RefreshRequest, SessionMetadata, TokenPair};
use crate::models::user::{LoginRequest, UserResponse, UserWithRole};
use crate::repositories::user as user_repo;
use crate::services::audit_log::{AuditLogEntry, AuditLogServiceTrait};
use crate::services::session_store::SessionStore;
use crate::services::token_issuer::TokenIssuer;
use crate::types::UserId;
use crate::utils::password::verify_password;

/// Read-only access to user accounts, as authentication needs them.
///
/// Use `MockUserDirectory` in tests to mock the behavior.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserWithRole>>;
    async fn find_by_id(&self, user_id: &UserId) -> anyhow::Result<Option<UserWithRole>>;
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserWithRole>> {
        Ok(user_repo::find_user_by_email(&self.pool, email).await?)
    }

    async fn find_by_id(&self, user_id: &UserId) -> anyhow::Result<Option<UserWithRole>> {
        Ok(user_repo::find_user_by_id(&self.pool, user_id).await?)
    }
}

/// Request context captured at the HTTP boundary, carried into audit
/// entries.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub session_id: String,
    pub user: UserResponse,
}

/// Credential verification, session establishment, and explicit revocation.
/// Every state transition is audited; audit failures are logged and
/// swallowed so they can never block an authentication flow.
pub struct AuthService {
    sessions: Arc<SessionStore>,
    issuer: TokenIssuer,
    users: Arc<dyn UserDirectory>,
    audit_log: Arc<dyn AuditLogServiceTrait>,
}

impl AuthService {
    pub fn new(
        sessions: Arc<SessionStore>,
        issuer: TokenIssuer,
        users: Arc<dyn UserDirectory>,
        audit_log: Arc<dyn AuditLogServiceTrait>,
    ) -> Self {
        Self {
            sessions,
            issuer,
            users,
            audit_log,
        }
    }

    /// Verifies credentials and establishes a session. Unknown email and
    /// wrong password are reported identically.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: ClientInfo,
    ) -> Result<LoginOutcome, AuthError> {
        let user = self.users.find_by_email(&request.email).await?;
        let Some(user) = user else {
            self.record_login_failure(&request.email, &client);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(&request.password, &user.user.password_hash)? {
            self.record_login_failure(&request.email, &client);
            return Err(AuthError::InvalidCredentials);
        }

        let metadata = SessionMetadata {
            login_method: "password".to_string(),
            remember_me: request.remember_me,
            role_claim: user.role_name.clone(),
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_address.clone(),
        };
        let created = self.sessions.create_session(user.user.id, metadata).await?;
        let (access_token, _) = self.issuer.issue_access_token(
            &created.session.user_id,
            created.session.metadata.role_claim.as_deref(),
            &created.session.id,
        )?;

        self.record_event(AuditLogEntry {
            occurred_at: Utc::now(),
            actor_id: Some(created.session.user_id.to_string()),
            actor_type: "user".to_string(),
            event_type: "login".to_string(),
            target_type: Some("session".to_string()),
            target_id: Some(created.session.id.clone()),
            result: "success".to_string(),
            error_code: None,
            metadata: Some(json!({ "remember_me": request.remember_me })),
            ip: client.ip_address,
            user_agent: client.user_agent,
            request_id: client.request_id,
        });
        tracing::info!(
            user_id = %created.session.user_id,
            session_id = %created.session.id,
            "User logged in"
        );

        Ok(LoginOutcome {
            tokens: TokenPair {
                access_token,
                refresh_token: created.refresh_token,
                expires_in: self.issuer.access_token_ttl_seconds(),
            },
            session_id: created.session.id,
            user: user.into(),
        })
    }

    /// Rotates a refresh token into a fresh token pair.
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        request_id: Option<String>,
    ) -> Result<TokenPair, SessionError> {
        match self.sessions.refresh_tokens(&request.refresh_token).await {
            Ok(grant) => {
                self.record_event(AuditLogEntry {
                    occurred_at: Utc::now(),
                    actor_id: Some(grant.user_id.to_string()),
                    actor_type: "user".to_string(),
                    event_type: "token_refresh".to_string(),
                    target_type: Some("session".to_string()),
                    target_id: Some(grant.session_id.clone()),
                    result: "success".to_string(),
                    error_code: None,
                    metadata: None,
                    ip: request.ip_address,
                    user_agent: request.user_agent,
                    request_id,
                });
                Ok(grant.tokens)
            }
            Err(err) => {
                self.record_event(AuditLogEntry {
                    occurred_at: Utc::now(),
                    actor_id: None,
                    actor_type: "anonymous".to_string(),
                    event_type: "token_refresh".to_string(),
                    target_type: Some("session".to_string()),
                    target_id: None,
                    result: "failure".to_string(),
                    error_code: Some(err.code().to_string()),
                    metadata: None,
                    ip: request.ip_address,
                    user_agent: request.user_agent,
                    request_id,
                });
                Err(err)
            }
        }
    }

    /// Ends the caller's session. Idempotent.
    pub async fn logout(
        &self,
        session_id: &str,
        user_id: &UserId,
        client: ClientInfo,
    ) -> anyhow::Result<()> {
        self.sessions.invalidate_session(session_id).await?;
        self.record_event(AuditLogEntry {
            occurred_at: Utc::now(),
            actor_id: Some(user_id.to_string()),
            actor_type: "user".to_string(),
            event_type: "logout".to_string(),
            target_type: Some("session".to_string()),
            target_id: Some(session_id.to_string()),
            result: "success".to_string(),
            error_code: None,
            metadata: None,
            ip: client.ip_address,
            user_agent: client.user_agent,
            request_id: client.request_id,
        });
        tracing::info!(%user_id, session_id, "User logged out");
        Ok(())
    }

    /// Revokes one session owned by the acting user.
    pub async fn revoke_session(
        &self,
        session_id: &str,
        acting_user: &UserWithRole,
        client: ClientInfo,
    ) -> Result<(), AppError> {
        let Some(session) = self.sessions.get_session(session_id).await? else {
            return Err(AppError::NotFound("Session not found".to_string()));
        };
        if session.user_id != acting_user.user.id {
            return Err(AppError::Forbidden(
                "Cannot revoke another user's session".to_string(),
            ));
        }

        self.sessions.invalidate_session(session_id).await?;
        self.record_event(AuditLogEntry {
            occurred_at: Utc::now(),
            actor_id: Some(acting_user.user.id.to_string()),
            actor_type: "user".to_string(),
            event_type: "session_revoke".to_string(),
            target_type: Some("session".to_string()),
            target_id: Some(session_id.to_string()),
            result: "success".to_string(),
            error_code: None,
            metadata: None,
            ip: client.ip_address,
            user_agent: client.user_agent,
            request_id: client.request_id,
        });
        Ok(())
    }

    /// Revokes every session of the user, returning how many were active.
    pub async fn revoke_all_sessions(
        &self,
        user_id: &UserId,
        client: ClientInfo,
    ) -> anyhow::Result<u64> {
        let count = self.sessions.invalidate_user_sessions(user_id).await?;
        self.record_event(AuditLogEntry {
            occurred_at: Utc::now(),
            actor_id: Some(user_id.to_string()),
            actor_type: "user".to_string(),
            event_type: "session_revoke_all".to_string(),
            target_type: Some("user".to_string()),
            target_id: Some(user_id.to_string()),
            result: "success".to_string(),
            error_code: None,
            metadata: Some(json!({ "revoked": count })),
            ip: client.ip_address,
            user_agent: client.user_agent,
            request_id: client.request_id,
        });
        Ok(count)
    }

    fn record_login_failure(&self, email: &str, client: &ClientInfo) {
        self.record_event(AuditLogEntry {
            occurred_at: Utc::now(),
            actor_id: None,
            actor_type: "anonymous".to_string(),
            event_type: "login".to_string(),
            target_type: None,
            target_id: None,
            result: "failure".to_string(),
            error_code: Some("INVALID_CREDENTIALS".to_string()),
            metadata: Some(json!({ "email": email })),
            ip: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            request_id: client.request_id.clone(),
        });
    }

    /// Fire-and-forget audit write; failures are logged, never surfaced.
    fn record_event(&self, entry: AuditLogEntry) {
        let audit_log = Arc::clone(&self.audit_log);
        tokio::spawn(async move {
            if let Err(err) = audit_log.record_event(entry).await {
                tracing::warn!(error = ?err, "Failed to record audit event");
            }
        });
    }
}
