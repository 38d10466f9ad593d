//! Periodic sweep: purges expired and deactivated sessions, trims audit
//! logs past their retention window, and reclaims table space. Intended to
//! run from cron.

use chrono::{Duration, Utc};

use hireflow_backend::{
    config::Config,
    db::connection::create_pool,
    services::audit_log::AuditLogService,
    services::session_store::{PgSessionBackend, SessionBackend},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;

    let sessions = PgSessionBackend::new((*pool).clone());
    let purged = sessions.purge_expired(Utc::now()).await?;
    if purged > 0 {
        tracing::info!("Purged {} expired or inactive sessions", purged);
    }

    sqlx::query("VACUUM (ANALYZE) sessions")
        .execute(pool.as_ref())
        .await?;

    let audit_log = AuditLogService::new((*pool).clone());
    let cutoff = Utc::now() - Duration::days(config.audit_log_retention_days);
    let trimmed = audit_log.delete_logs_before(cutoff).await?;
    if trimmed > 0 {
        tracing::info!("Deleted {} audit log entries past retention", trimmed);
    }

    sqlx::query("VACUUM (ANALYZE) audit_logs")
        .execute(pool.as_ref())
        .await?;

    Ok(())
}
