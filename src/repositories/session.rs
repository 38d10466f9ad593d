use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::session::Session;
use crate::types::UserId;

pub async fn insert_session(pool: &PgPool, session: &Session) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sessions
            (id, user_id, refresh_token_hash, is_active, created_at, last_activity, expires_at,
             login_method, remember_me, role_claim, user_agent, ip_address)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(&session.id)
    .bind(&session.user_id)
    .bind(&session.refresh_token_hash)
    .bind(session.is_active)
    .bind(session.created_at)
    .bind(session.last_activity)
    .bind(session.expires_at)
    .bind(&session.metadata.login_method)
    .bind(session.metadata.remember_me)
    .bind(&session.metadata.role_claim)
    .bind(&session.metadata.user_agent)
    .bind(&session.metadata.ip_address)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn find_session_by_id(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT id, user_id, refresh_token_hash, is_active, created_at, last_activity, expires_at,
               login_method, remember_me, role_claim, user_agent, ip_address
        FROM sessions
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_active_session_by_token_hash(
    pool: &PgPool,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT id, user_id, refresh_token_hash, is_active, created_at, last_activity, expires_at,
               login_method, remember_me, role_claim, user_agent, ip_address
        FROM sessions
        WHERE refresh_token_hash = $1 AND is_active = TRUE AND expires_at > $2
        "#,
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// Conditional rotation keyed on the current token hash. Under concurrent
/// refreshes with the same token, exactly one update matches a row; the
/// rest get `None`.
pub async fn rotate_session_tokens(
    pool: &PgPool,
    current_hash: &str,
    new_hash: &str,
    last_activity: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        UPDATE sessions
        SET refresh_token_hash = $1,
            last_activity = $2,
            expires_at = $3
        WHERE refresh_token_hash = $4 AND is_active = TRUE AND expires_at > $5
        RETURNING id, user_id, refresh_token_hash, is_active, created_at, last_activity, expires_at,
                  login_method, remember_me, role_claim, user_agent, ip_address
        "#,
    )
    .bind(new_hash)
    .bind(last_activity)
    .bind(expires_at)
    .bind(current_hash)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn deactivate_session(pool: &PgPool, session_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET is_active = FALSE
        WHERE id = $1 AND is_active = TRUE
        "#,
    )
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn deactivate_user_sessions(
    pool: &PgPool,
    user_id: &UserId,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET is_active = FALSE
        WHERE user_id = $1 AND is_active = TRUE
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn count_active_sessions_per_user(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT user_id, COUNT(*)
        FROM sessions
        WHERE is_active = TRUE AND expires_at > $1
        GROUP BY user_id
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Deletes expired and deactivated rows. Invalidation only flips
/// `is_active`; actual row removal happens here.
pub async fn purge_sessions(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1 OR is_active = FALSE")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
