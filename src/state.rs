use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::audit_log::{AuditLogService, AuditLogServiceTrait};
use crate::services::auth::{AuthService, PgUserDirectory, UserDirectory};
use crate::services::permission::{PermissionBackend, PermissionStore, PgPermissionBackend};
use crate::services::session_store::{PgSessionBackend, SessionBackend, SessionStore};
use crate::services::token_issuer::TokenIssuer;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub token_issuer: TokenIssuer,
    pub auth: Arc<AuthService>,
    pub sessions: Arc<SessionStore>,
    pub permissions: Arc<PermissionStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Wires the services over explicit backends. Tests inject in-memory
    /// backends here.
    pub fn new(
        config: Config,
        session_backend: Arc<dyn SessionBackend>,
        permission_backend: Arc<dyn PermissionBackend>,
        users: Arc<dyn UserDirectory>,
        audit_log: Arc<dyn AuditLogServiceTrait>,
    ) -> Self {
        let token_issuer = TokenIssuer::new(&config);
        let sessions = Arc::new(SessionStore::new(
            session_backend,
            token_issuer.clone(),
            &config,
        ));
        let permissions = Arc::new(PermissionStore::new(permission_backend));
        let auth = Arc::new(AuthService::new(
            Arc::clone(&sessions),
            token_issuer.clone(),
            Arc::clone(&users),
            audit_log,
        ));
        Self {
            config,
            token_issuer,
            auth,
            sessions,
            permissions,
            users,
        }
    }

    /// Production wiring over a Postgres pool.
    pub fn postgres(pool: DbPool, config: Config) -> Self {
        let pg = (*pool).clone();
        Self::new(
            config,
            Arc::new(PgSessionBackend::new(pg.clone())),
            Arc::new(PgPermissionBackend::new(pg.clone())),
            Arc::new(PgUserDirectory::new(pg.clone())),
            Arc::new(AuditLogService::new(pg)),
        )
    }
}
