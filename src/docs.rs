#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    models::{
        role::{AssignPermissions, CreatePermission, CreateRole, Permission, PermissionCheckResult, Role},
        session::{
            CurrentSessionResponse, RefreshRequest, RevokeSessionRequest, SessionMetadata,
            SessionResponse, SessionStats, TokenPair,
        },
        user::{LoginRequest, LoginResponse, UserResponse},
    },
    types::{PermissionId, RoleId},
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        login_doc,
        refresh_doc,
        logout_doc,
        current_session_doc,
        revoke_doc,
        list_roles_doc,
        create_role_doc,
        delete_role_doc,
        role_permissions_doc,
        assign_permissions_doc,
        replace_permissions_doc,
        list_permissions_doc,
        create_permission_doc,
        delete_permission_doc,
        session_stats_doc
    ),
    components(
        schemas(
            // auth
            LoginRequest,
            LoginResponse,
            UserResponse,
            RefreshRequest,
            TokenPair,
            RevokeSessionRequest,
            CurrentSessionResponse,
            SessionResponse,
            SessionMetadata,
            SessionStats,
            // roles & permissions
            Role,
            RoleId,
            Permission,
            PermissionId,
            CreateRole,
            CreatePermission,
            AssignPermissions,
            PermissionCheckResult
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Login, token refresh, and session lifecycle"),
        (name = "Admin", description = "Role, permission, and session administration")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated; returns tokens and session identity", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired, or already used")
    ),
    tag = "Auth",
    security(())
)]
fn refresh_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Session invalidated", body = serde_json::Value)),
    tag = "Auth"
)]
fn logout_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses((status = 200, description = "Current session, including whether a refresh is due", body = CurrentSessionResponse)),
    tag = "Auth"
)]
fn current_session_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/revoke",
    request_body = RevokeSessionRequest,
    responses(
        (status = 200, description = "Session(s) revoked", body = serde_json::Value),
        (status = 403, description = "Session belongs to another user"),
        (status = 404, description = "Session not found")
    ),
    tag = "Auth"
)]
fn revoke_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/roles",
    responses((status = 200, body = [Role])),
    tag = "Admin"
)]
fn list_roles_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/roles",
    request_body = CreateRole,
    responses(
        (status = 201, body = Role),
        (status = 409, description = "Role name already taken")
    ),
    tag = "Admin"
)]
fn create_role_doc() {}

#[utoipa::path(
    delete,
    path = "/api/admin/roles/{id}",
    params(("id" = String, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 409, description = "Role still assigned to users")
    ),
    tag = "Admin"
)]
fn delete_role_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/roles/{id}/permissions",
    params(("id" = String, Path, description = "Role ID")),
    responses((status = 200, body = [Permission])),
    tag = "Admin"
)]
fn role_permissions_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/roles/{id}/permissions",
    params(("id" = String, Path, description = "Role ID")),
    request_body = AssignPermissions,
    responses(
        (status = 200, description = "Permissions added to the role", body = serde_json::Value),
        (status = 404, description = "Role or permission not found")
    ),
    tag = "Admin"
)]
fn assign_permissions_doc() {}

#[utoipa::path(
    put,
    path = "/api/admin/roles/{id}/permissions",
    params(("id" = String, Path, description = "Role ID")),
    request_body = AssignPermissions,
    responses((status = 200, description = "Resulting permission set", body = [Permission])),
    tag = "Admin"
)]
fn replace_permissions_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/permissions",
    responses((status = 200, body = [Permission])),
    tag = "Admin"
)]
fn list_permissions_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/permissions",
    request_body = CreatePermission,
    responses(
        (status = 201, body = Permission),
        (status = 409, description = "Permission name already taken")
    ),
    tag = "Admin"
)]
fn create_permission_doc() {}

#[utoipa::path(
    delete,
    path = "/api/admin/permissions/{id}",
    params(("id" = String, Path, description = "Permission ID")),
    responses(
        (status = 204, description = "Permission deleted"),
        (status = 409, description = "Permission still referenced by roles")
    ),
    tag = "Admin"
)]
fn delete_permission_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/sessions/stats",
    responses((status = 200, body = SessionStats)),
    tag = "Admin"
)]
fn session_stats_doc() {}
