use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, PgPool};

use crate::models::audit_log::AuditLog;
use crate::repositories::audit_log as audit_log_repo;
use crate::types::AuditLogId;

/// A security event to be appended to the audit trail.
#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub actor_type: String,
    pub event_type: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub result: String,
    pub error_code: Option<String>,
    pub metadata: Option<Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

/// Append-only audit sink. Callers treat recording as best-effort: a failed
/// write is logged by the caller, never propagated into the user-facing flow.
#[async_trait]
pub trait AuditLogServiceTrait: Send + Sync {
    async fn record_event(&self, entry: AuditLogEntry) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct AuditLogService {
    pool: PgPool,
}

impl AuditLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retention cleanup used by operational tooling.
    pub async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        Ok(audit_log_repo::delete_audit_logs_before(&self.pool, cutoff).await?)
    }
}

#[async_trait]
impl AuditLogServiceTrait for AuditLogService {
    async fn record_event(&self, entry: AuditLogEntry) -> anyhow::Result<()> {
        let log = AuditLog {
            id: AuditLogId::new(),
            occurred_at: entry.occurred_at,
            actor_id: entry.actor_id,
            actor_type: entry.actor_type,
            event_type: entry.event_type,
            target_type: entry.target_type,
            target_id: entry.target_id,
            result: entry.result,
            error_code: entry.error_code,
            metadata: entry.metadata.map(Json),
            ip: entry.ip,
            user_agent: entry.user_agent,
            request_id: entry.request_id,
        };

        audit_log_repo::insert_audit_log(&self.pool, &log).await?;
        Ok(())
    }
}
