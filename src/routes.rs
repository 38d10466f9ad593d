//! Route table for the HTTP API.
//!
//! Auth-gated groups attach the session middleware with `route_layer` so
//! unknown paths still produce 404 rather than 401. Cross-cutting layers
//! (tracing, CORS, request ids) are the binary's concern.

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};

use crate::handlers;
use crate::middleware::auth;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh));

    // Routes requiring an authenticated session
    let session_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/session", get(handlers::auth::current_session))
        .route("/api/auth/revoke", post(handlers::auth::revoke))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::auth,
        ));

    // Admin routes; permission checks happen inside the handlers
    let admin_routes = Router::new()
        .route(
            "/api/admin/roles",
            get(handlers::roles::list_roles).post(handlers::roles::create_role),
        )
        .route("/api/admin/roles/{id}", delete(handlers::roles::delete_role))
        .route(
            "/api/admin/roles/{id}/permissions",
            get(handlers::roles::get_role_permissions)
                .post(handlers::roles::assign_role_permissions)
                .put(handlers::roles::replace_role_permissions),
        )
        .route(
            "/api/admin/permissions",
            get(handlers::roles::list_permissions).post(handlers::roles::create_permission),
        )
        .route(
            "/api/admin/permissions/{id}",
            delete(handlers::roles::delete_permission),
        )
        .route(
            "/api/admin/sessions/stats",
            get(handlers::roles::session_stats),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .with_state(state)
}
