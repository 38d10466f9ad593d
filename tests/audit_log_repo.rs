//! Postgres audit log repository tests. These need a real database and run
//! only when TEST_DATABASE_URL is set; without it every test skips.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;

use hireflow_backend::models::audit_log::AuditLog;
use hireflow_backend::repositories::audit_log as audit_log_repo;
use hireflow_backend::types::AuditLogId;

async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres repository tests");
        return None;
    };
    let pool = PgPool::connect(&url).await.expect("connect test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

fn entry_at(occurred_at: DateTime<Utc>) -> AuditLog {
    AuditLog {
        id: AuditLogId::new(),
        occurred_at,
        actor_id: Some("user-1".to_string()),
        actor_type: "user".to_string(),
        event_type: "session_revoke_all".to_string(),
        target_type: Some("user".to_string()),
        target_id: Some("user-1".to_string()),
        result: "success".to_string(),
        error_code: None,
        metadata: Some(Json(json!({ "revoked": 3 }))),
        ip: Some("203.0.113.9".to_string()),
        user_agent: Some("repo-test".to_string()),
        request_id: Some("req-42".to_string()),
    }
}

#[tokio::test]
async fn insert_and_fetch_round_trip() {
    let Some(pool) = test_pool().await else { return };
    let entry = entry_at(Utc::now());
    audit_log_repo::insert_audit_log(&pool, &entry)
        .await
        .expect("insert");

    let fetched = audit_log_repo::fetch_audit_log(&pool, &entry.id)
        .await
        .expect("fetch")
        .expect("entry exists");

    assert_eq!(fetched.id, entry.id);
    assert_eq!(fetched.event_type, "session_revoke_all");
    assert_eq!(fetched.actor_id.as_deref(), Some("user-1"));
    assert_eq!(fetched.result, "success");
    assert_eq!(fetched.request_id.as_deref(), Some("req-42"));
    // TIMESTAMPTZ stores microseconds; the sub-microsecond part is lost.
    let skew = (fetched.occurred_at - entry.occurred_at).num_milliseconds();
    assert!(skew.abs() < 1, "occurred_at drifted by {skew}ms");

    let metadata = fetched.metadata.expect("metadata present");
    assert_eq!(metadata.0, json!({ "revoked": 3 }));
}

#[tokio::test]
async fn fetch_unknown_id_is_none() {
    let Some(pool) = test_pool().await else { return };
    let fetched = audit_log_repo::fetch_audit_log(&pool, &AuditLogId::new())
        .await
        .expect("fetch");
    assert!(fetched.is_none());
}

#[tokio::test]
async fn retention_cutoff_deletes_only_older_entries() {
    let Some(pool) = test_pool().await else { return };
    let stale = entry_at(Utc::now() - Duration::days(400));
    let fresh = entry_at(Utc::now());
    audit_log_repo::insert_audit_log(&pool, &stale)
        .await
        .expect("insert stale");
    audit_log_repo::insert_audit_log(&pool, &fresh)
        .await
        .expect("insert fresh");

    let deleted =
        audit_log_repo::delete_audit_logs_before(&pool, Utc::now() - Duration::days(365))
            .await
            .expect("delete");
    assert!(deleted >= 1);

    assert!(audit_log_repo::fetch_audit_log(&pool, &stale.id)
        .await
        .expect("fetch stale")
        .is_none());
    assert!(audit_log_repo::fetch_audit_log(&pool, &fresh.id)
        .await
        .expect("fetch fresh")
        .is_some());
}
