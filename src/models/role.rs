//! Models for roles, permissions, and their assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{PermissionId, RoleId};
use crate::validation::rules;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// A named bundle of permissions. `name` is unique and immutable.
pub struct Role {
    pub id: RoleId,
    /// Machine identifier, snake_case (e.g. `hiring_manager`).
    pub name: String,
    /// Label shown in admin interfaces.
    pub display_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// A single grantable capability. `name` is unique and dot-namespaced
/// (e.g. `jobs.publish`).
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, display_name: String, description: Option<String>) -> Self {
        Self {
            id: RoleId::new(),
            name,
            display_name,
            description,
            created_at: Utc::now(),
        }
    }
}

impl Permission {
    pub fn new(name: String, description: Option<String>) -> Self {
        Self {
            id: PermissionId::new(),
            name,
            description,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Payload for creating a role.
pub struct CreateRole {
    #[validate(custom(function = "rules::validate_role_name"))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Payload for creating a permission.
pub struct CreatePermission {
    #[validate(custom(function = "rules::validate_permission_name"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
/// Payload for assigning or replacing a role's permissions.
pub struct AssignPermissions {
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Result of an all-permissions check, naming anything the user lacks.
pub struct PermissionCheckResult {
    pub has_permission: bool,
    pub missing: Vec<String>,
}
