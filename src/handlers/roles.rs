//! Admin endpoints for role and permission management plus session stats.
//! Access is gated by permission checks, not by a hardcoded role.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::role::{AssignPermissions, CreatePermission, CreateRole, Permission, Role},
    models::session::SessionStats,
    services::permission::{ROLES_MANAGE, SESSIONS_READ},
    state::AppState,
    types::{PermissionId, RoleId},
    validation::Validate,
};

pub async fn list_roles(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<Vec<Role>>, AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    let roles = state.permissions.list_roles().await?;
    Ok(Json(roles))
}

pub async fn create_role(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<CreateRole>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    payload.validate()?;
    let role = state.permissions.create_role(payload).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(role_id): Path<String>,
) -> Result<StatusCode, AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    let role_id = parse_role_id(&role_id)?;
    state.permissions.delete_role(&role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_role_permissions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(role_id): Path<String>,
) -> Result<Json<Vec<Permission>>, AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    let role_id = parse_role_id(&role_id)?;
    let permissions = state.permissions.get_permissions_by_role_id(&role_id).await?;
    Ok(Json(permissions))
}

pub async fn assign_role_permissions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(role_id): Path<String>,
    Json(payload): Json<AssignPermissions>,
) -> Result<Json<Value>, AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    let role_id = parse_role_id(&role_id)?;
    state
        .permissions
        .assign_permissions_to_role(&role_id, &payload.permission_ids)
        .await?;
    Ok(Json(json!({
        "message": "Permissions assigned",
        "role_id": role_id.to_string()
    })))
}

pub async fn replace_role_permissions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(role_id): Path<String>,
    Json(payload): Json<AssignPermissions>,
) -> Result<Json<Vec<Permission>>, AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    let role_id = parse_role_id(&role_id)?;
    let permissions = state
        .permissions
        .replace_role_permissions(&role_id, &payload.permission_ids)
        .await?;
    Ok(Json(permissions))
}

pub async fn list_permissions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<Vec<Permission>>, AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    let permissions = state.permissions.list_permissions().await?;
    Ok(Json(permissions))
}

pub async fn create_permission(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<CreatePermission>,
) -> Result<(StatusCode, Json<Permission>), AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    payload.validate()?;
    let permission = state.permissions.create_permission(payload).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(permission_id): Path<String>,
) -> Result<StatusCode, AppError> {
    require(&state, &context, ROLES_MANAGE).await?;
    let permission_id = parse_permission_id(&permission_id)?;
    state.permissions.delete_permission(&permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn session_stats(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<SessionStats>, AppError> {
    require(&state, &context, SESSIONS_READ).await?;
    let stats = state.sessions.get_stats().await?;
    Ok(Json(stats))
}

async fn require(
    state: &AppState,
    context: &AuthContext,
    permission: &str,
) -> Result<(), AppError> {
    Ok(state
        .permissions
        .require_permission(&context.user.user.id, permission)
        .await?)
}

fn parse_role_id(raw: &str) -> Result<RoleId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid role ID".to_string()))
}

fn parse_permission_id(raw: &str) -> Result<PermissionId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid permission ID".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_role_id_accepts_uuid_strings() {
        let id = RoleId::new();
        assert_eq!(parse_role_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn parse_role_id_rejects_garbage() {
        assert!(matches!(
            parse_role_id("not-a-uuid"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn parse_permission_id_rejects_garbage() {
        assert!(parse_permission_id("").is_err());
    }
}
