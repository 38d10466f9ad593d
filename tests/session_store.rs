//! Behavioral tests for the session store over the in-memory backend:
//! validation outcomes, refresh rotation, revocation, and cleanup.

use std::sync::Arc;

use chrono::Duration;

use hireflow_backend::config::Config;
use hireflow_backend::error::SessionError;
use hireflow_backend::models::session::{Session, SessionMetadata};
use hireflow_backend::services::session_store::{
    MemorySessionBackend, SessionBackend, SessionStore,
};
use hireflow_backend::services::token_issuer::TokenIssuer;
use hireflow_backend::types::UserId;
use hireflow_backend::utils::token::hash_refresh_token;

fn config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test-secret".to_string(),
        access_token_ttl_minutes: 5,
        session_ttl_minutes: 15,
        remember_me_ttl_days: 30,
        refresh_threshold_percent: 20,
        audit_log_retention_days: 365,
        port: 0,
    }
}

fn store_over(backend: Arc<MemorySessionBackend>) -> SessionStore {
    let config = config();
    SessionStore::new(backend, TokenIssuer::new(&config), &config)
}

fn metadata(remember_me: bool) -> SessionMetadata {
    SessionMetadata {
        login_method: "password".to_string(),
        remember_me,
        role_claim: Some("recruiter".to_string()),
        user_agent: None,
        ip_address: None,
    }
}

#[tokio::test]
async fn stored_hash_matches_the_issued_refresh_token() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    let created = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();

    let stored = backend.get(&created.session.id).await.unwrap().unwrap();
    assert_eq!(
        stored.refresh_token_hash,
        hash_refresh_token(&created.refresh_token)
    );
    assert_ne!(stored.refresh_token_hash, created.refresh_token);
}

#[tokio::test]
async fn creation_picks_the_ttl_from_the_remember_me_flag() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend);

    let short = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap()
        .session;
    assert_eq!(short.expires_at - short.created_at, Duration::minutes(15));

    let long = store
        .create_session(UserId::new(), metadata(true))
        .await
        .unwrap()
        .session;
    assert_eq!(long.expires_at - long.created_at, Duration::days(30));
}

#[tokio::test]
async fn validation_rejects_absent_inactive_and_expired_sessions() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    let absent = store.validate_session("no-such-session").await.unwrap();
    assert!(!absent.is_valid);
    assert!(matches!(absent.error, Some(SessionError::SessionInvalid)));
    assert!(absent.session.is_none());

    let created = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();
    assert!(store
        .validate_session(&created.session.id)
        .await
        .unwrap()
        .is_valid);

    store.invalidate_session(&created.session.id).await.unwrap();
    let inactive = store.validate_session(&created.session.id).await.unwrap();
    assert!(!inactive.is_valid);

    let expired = Session::new(
        UserId::new(),
        "hash".to_string(),
        Duration::minutes(-1),
        metadata(false),
    );
    let expired_id = expired.id.clone();
    backend.insert(expired).await.unwrap();
    let expired = store.validate_session(&expired_id).await.unwrap();
    assert!(!expired.is_valid);
    assert!(matches!(expired.error, Some(SessionError::SessionInvalid)));
}

#[tokio::test]
async fn needs_refresh_trips_under_the_threshold() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    // Fresh sessions sit well above 20% of a 15 minute TTL.
    let fresh = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();
    let validation = store.validate_session(&fresh.session.id).await.unwrap();
    assert!(validation.is_valid);
    assert!(!validation.needs_refresh);

    // Two minutes left is under the three minute threshold.
    let expiring = Session::new(
        UserId::new(),
        "hash".to_string(),
        Duration::minutes(2),
        metadata(false),
    );
    let expiring_id = expiring.id.clone();
    backend.insert(expiring).await.unwrap();
    let validation = store.validate_session(&expiring_id).await.unwrap();
    assert!(validation.is_valid);
    assert!(validation.needs_refresh);
}

#[tokio::test]
async fn validation_does_not_mutate_the_session() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    let created = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();
    let before = backend.get(&created.session.id).await.unwrap().unwrap();

    for _ in 0..3 {
        store.validate_session(&created.session.id).await.unwrap();
    }

    let after = backend.get(&created.session.id).await.unwrap().unwrap();
    assert_eq!(before.last_activity, after.last_activity);
    assert_eq!(before.expires_at, after.expires_at);
    assert_eq!(before.refresh_token_hash, after.refresh_token_hash);
}

#[tokio::test]
async fn rotation_swaps_the_hash_and_extends_the_session() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    let created = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();
    let before = backend.get(&created.session.id).await.unwrap().unwrap();

    let grant = store.refresh_tokens(&created.refresh_token).await.unwrap();
    assert_eq!(grant.session_id, created.session.id);
    assert_eq!(grant.user_id, created.session.user_id);
    assert_ne!(grant.tokens.refresh_token, created.refresh_token);

    let after = backend.get(&created.session.id).await.unwrap().unwrap();
    assert_ne!(after.refresh_token_hash, before.refresh_token_hash);
    assert_eq!(
        after.refresh_token_hash,
        hash_refresh_token(&grant.tokens.refresh_token)
    );
    assert!(after.last_activity >= before.last_activity);
    assert!(after.expires_at >= before.expires_at);
    // Still a 15 minute window from the rotation, not from creation.
    assert_eq!(after.expires_at - after.last_activity, Duration::minutes(15));
}

#[tokio::test]
async fn a_refresh_token_is_spent_by_its_first_use() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend);

    let created = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();

    store.refresh_tokens(&created.refresh_token).await.unwrap();
    let err = store
        .refresh_tokens(&created.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidRefreshToken));
}

#[tokio::test]
async fn concurrent_rotations_produce_exactly_one_winner() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = Arc::new(store_over(backend));

    let created = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();
    let token = created.refresh_token;

    let (a, b, c, d) = tokio::join!(
        store.refresh_tokens(&token),
        store.refresh_tokens(&token),
        store.refresh_tokens(&token),
        store.refresh_tokens(&token),
    );
    let outcomes = [a, b, c, d];
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for outcome in outcomes.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            outcome.as_ref().unwrap_err(),
            SessionError::InvalidRefreshToken
        ));
    }
}

#[tokio::test]
async fn rotation_refuses_inactive_sessions() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend);

    let created = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();
    store.invalidate_session(&created.session.id).await.unwrap();

    let err = store
        .refresh_tokens(&created.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidRefreshToken));
}

#[tokio::test]
async fn rotation_keeps_the_remember_me_window() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    let created = store
        .create_session(UserId::new(), metadata(true))
        .await
        .unwrap();
    let grant = store.refresh_tokens(&created.refresh_token).await.unwrap();

    let after = backend.get(&grant.session_id).await.unwrap().unwrap();
    assert_eq!(after.expires_at - after.last_activity, Duration::days(30));
}

#[tokio::test]
async fn invalidation_is_idempotent_and_keeps_the_row() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    let created = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();

    store.invalidate_session(&created.session.id).await.unwrap();
    store.invalidate_session(&created.session.id).await.unwrap();
    store.invalidate_session("never-existed").await.unwrap();

    let row = backend.get(&created.session.id).await.unwrap().unwrap();
    assert!(!row.is_active);
}

#[tokio::test]
async fn revoking_all_sessions_counts_only_active_ones() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend);

    let user = UserId::new();
    let first = store.create_session(user, metadata(false)).await.unwrap();
    store.create_session(user, metadata(false)).await.unwrap();
    store.create_session(user, metadata(false)).await.unwrap();
    store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();

    store.invalidate_session(&first.session.id).await.unwrap();

    assert_eq!(store.invalidate_user_sessions(&user).await.unwrap(), 2);
    assert_eq!(store.invalidate_user_sessions(&user).await.unwrap(), 0);
}

#[tokio::test]
async fn stats_skip_expired_and_inactive_sessions() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    let alice = UserId::new();
    let bob = UserId::new();
    store.create_session(alice, metadata(false)).await.unwrap();
    store.create_session(alice, metadata(false)).await.unwrap();
    let bobs = store.create_session(bob, metadata(false)).await.unwrap();
    store.invalidate_session(&bobs.session.id).await.unwrap();
    backend
        .insert(Session::new(
            alice,
            "stale".to_string(),
            Duration::minutes(-5),
            metadata(false),
        ))
        .await
        .unwrap();

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.sessions_per_user.get(&alice.to_string()), Some(&2));
    assert_eq!(stats.sessions_per_user.get(&bob.to_string()), None);
}

#[tokio::test]
async fn purge_drops_expired_and_inactive_rows_only() {
    let backend = Arc::new(MemorySessionBackend::new());
    let store = store_over(backend.clone());

    let live = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();
    let dead = store
        .create_session(UserId::new(), metadata(false))
        .await
        .unwrap();
    store.invalidate_session(&dead.session.id).await.unwrap();
    backend
        .insert(Session::new(
            UserId::new(),
            "stale".to_string(),
            Duration::minutes(-5),
            metadata(false),
        ))
        .await
        .unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 2);
    assert!(backend.get(&live.session.id).await.unwrap().is_some());
    assert!(backend.get(&dead.session.id).await.unwrap().is_none());
}
