//! Session-backed authentication middleware.
//!
//! Requests authenticate with a bearer access token whose `sid` claim names
//! the session, or with a bare `X-Session-ID` header. Either way the session
//! itself is validated on every request, so revoked sessions stop working
//! even while their access tokens are still unexpired.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AppError, SessionError},
    models::{session::Session, user::UserWithRole},
    state::AppState,
    utils::jwt::Claims,
};

/// Fallback header for clients that hold a session id but no access token.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Authenticated request context, inserted into request extensions for
/// handlers to extract.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user: UserWithRole,
    pub session: Session,
    pub needs_refresh: bool,
    /// Set when the request carried a bearer access token.
    pub claims: Option<Claims>,
}

pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = authenticate_request(&state, request.headers()).await?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

async fn authenticate_request(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthContext, AppError> {
    let (session_id, claims) = resolve_session_id(state, headers)?;

    let validation = state.sessions.validate_session(&session_id).await?;
    if !validation.is_valid {
        let err = validation.error.unwrap_or(SessionError::SessionInvalid);
        return Err(err.into());
    }
    let session = validation.session.ok_or(SessionError::SessionInvalid)?;

    // A session may outlive its user row. Treat that as an invalid session.
    let user = state
        .users
        .find_by_id(&session.user_id)
        .await?
        .ok_or(SessionError::SessionInvalid)?;

    Ok(AuthContext {
        user,
        session,
        needs_refresh: validation.needs_refresh,
        claims,
    })
}

/// The access token is authoritative when present. Clients without one fall
/// back to the `X-Session-ID` header; a request carrying neither is a 401
/// with `SESSION_ID_MISSING`.
fn resolve_session_id(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(String, Option<Claims>), AppError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token);

    if let Some(token) = bearer {
        let claims = state
            .token_issuer
            .verify_access_token(token)
            .map_err(|_| SessionError::SessionInvalid)?;
        return Ok((claims.sid.clone(), Some(claims)));
    }

    if let Some(session_id) = headers
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
    {
        return Ok((session_id.to_string(), None));
    }

    Err(SessionError::SessionIdMissing.into())
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(rest.trim_start())
    } else {
        None
    }
}
