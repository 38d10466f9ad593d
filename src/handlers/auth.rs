//! Authentication endpoints: login, refresh, logout, session introspection,
//! and explicit revocation.

use axum::{
    extract::{Extension, State},
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::{auth::AuthContext, request_id::RequestId},
    models::session::{CurrentSessionResponse, RefreshRequest, RevokeSessionRequest, TokenPair},
    models::user::{LoginRequest, LoginResponse},
    services::auth::ClientInfo,
    state::AppState,
    validation::Validate,
};

pub async fn login(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let client = client_info(&headers, &request_id);
    let outcome = state.auth.login(payload, client).await?;

    Ok(Json(LoginResponse {
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        expires_in: outcome.tokens.expires_in,
        session_id: outcome.session_id,
        user: outcome.user,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(mut payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    payload.validate()?;

    // Transport context fills in whatever the client did not self-report.
    if payload.user_agent.is_none() {
        payload.user_agent = extract_user_agent(&headers);
    }
    if payload.ip_address.is_none() {
        payload.ip_address = extract_ip(&headers);
    }

    let tokens = state.auth.refresh(payload, Some(request_id.0)).await?;
    Ok(Json(tokens))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let client = client_info(&headers, &request_id);
    state
        .auth
        .logout(&context.session.id, &context.user.user.id, client)
        .await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn current_session(
    Extension(context): Extension<AuthContext>,
) -> Json<CurrentSessionResponse> {
    Json(CurrentSessionResponse {
        session: context.session.into(),
        needs_refresh: context.needs_refresh,
        user: context.user.into(),
    })
}

pub async fn revoke(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(payload): Json<RevokeSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let client = client_info(&headers, &request_id);

    if payload.all {
        let revoked = state
            .auth
            .revoke_all_sessions(&context.user.user.id, client)
            .await?;
        return Ok(Json(json!({
            "message": "All sessions revoked",
            "revoked": revoked
        })));
    }

    let session_id = payload
        .session_id
        .unwrap_or_else(|| context.session.id.clone());
    state
        .auth
        .revoke_session(&session_id, &context.user, client)
        .await?;

    Ok(Json(json!({
        "message": "Session revoked",
        "session_id": session_id
    })))
}

fn client_info(headers: &HeaderMap, request_id: &RequestId) -> ClientInfo {
    ClientInfo {
        ip_address: extract_ip(headers),
        user_agent: extract_user_agent(headers),
        request_id: Some(request_id.0.clone()),
    }
}

fn extract_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        return value
            .split(',')
            .next()
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|agent| agent.trim().to_string())
        .filter(|agent| !agent.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.1, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "203.0.113.2".parse().unwrap());
        assert_eq!(extract_ip(&headers).as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn extract_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.2".parse().unwrap());
        assert_eq!(extract_ip(&headers).as_deref(), Some("203.0.113.2"));
    }

    #[test]
    fn extract_ip_without_headers_is_none() {
        assert_eq!(extract_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn extract_user_agent_trims_and_drops_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, "  hireflow-cli/1.2  ".parse().unwrap());
        assert_eq!(
            extract_user_agent(&headers).as_deref(),
            Some("hireflow-cli/1.2")
        );

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, "".parse().unwrap());
        assert_eq!(extract_user_agent(&headers), None);
    }
}
