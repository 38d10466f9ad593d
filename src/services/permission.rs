use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AuthorizationError, RoleError};
use crate::models::role::{CreatePermission, CreateRole, Permission, PermissionCheckResult, Role};
use crate::repositories::role as role_repo;
use crate::types::{PermissionId, RoleId, UserId};

/// Permission required to manage roles and permissions.
pub const ROLES_MANAGE: &str = "roles.manage";
/// Permission required to read session statistics.
pub const SESSIONS_READ: &str = "sessions.read";

/// Storage port for roles, permissions, and their associations.
/// `replace_permissions` must be atomic: either the full clear-then-insert
/// lands or nothing does.
#[async_trait]
pub trait PermissionBackend: Send + Sync {
    async fn role_id_for_user(&self, user_id: &UserId) -> anyhow::Result<Option<RoleId>>;
    async fn user_has_permission(&self, user_id: &UserId, permission: &str)
        -> anyhow::Result<bool>;
    async fn permission_names_for_role(&self, role_id: &RoleId) -> anyhow::Result<Vec<String>>;
    async fn permissions_for_role(&self, role_id: &RoleId) -> anyhow::Result<Vec<Permission>>;
    async fn find_role_by_id(&self, role_id: &RoleId) -> anyhow::Result<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>>;
    async fn find_permission_by_name(&self, name: &str) -> anyhow::Result<Option<Permission>>;
    async fn find_existing_permission_ids(
        &self,
        ids: &[PermissionId],
    ) -> anyhow::Result<Vec<PermissionId>>;
    async fn insert_role(&self, role: &Role) -> anyhow::Result<()>;
    async fn insert_permission(&self, permission: &Permission) -> anyhow::Result<()>;
    async fn list_roles(&self) -> anyhow::Result<Vec<Role>>;
    async fn list_permissions(&self) -> anyhow::Result<Vec<Permission>>;
    async fn delete_role(&self, role_id: &RoleId) -> anyhow::Result<bool>;
    async fn delete_permission(&self, permission_id: &PermissionId) -> anyhow::Result<bool>;
    async fn assign_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> anyhow::Result<()>;
    async fn replace_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> anyhow::Result<()>;
    async fn count_users_with_role(&self, role_id: &RoleId) -> anyhow::Result<i64>;
    async fn count_roles_with_permission(
        &self,
        permission_id: &PermissionId,
    ) -> anyhow::Result<i64>;
}

#[derive(Default)]
struct PermissionState {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    role_permissions: HashSet<(RoleId, PermissionId)>,
    user_roles: HashMap<UserId, RoleId>,
}

/// Process-local backend for tests and single-process use. Atomicity comes
/// from doing every multi-step mutation under one write lock.
#[derive(Default)]
pub struct MemoryPermissionBackend {
    state: RwLock<PermissionState>,
}

impl MemoryPermissionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires a user to a role (or clears it). The SQL backend reads this
    /// from the users table instead.
    pub async fn set_user_role(&self, user_id: UserId, role_id: Option<RoleId>) {
        let mut state = self.state.write().await;
        match role_id {
            Some(role_id) => {
                state.user_roles.insert(user_id, role_id);
            }
            None => {
                state.user_roles.remove(&user_id);
            }
        }
    }
}

#[async_trait]
impl PermissionBackend for MemoryPermissionBackend {
    async fn role_id_for_user(&self, user_id: &UserId) -> anyhow::Result<Option<RoleId>> {
        Ok(self.state.read().await.user_roles.get(user_id).copied())
    }

    async fn user_has_permission(
        &self,
        user_id: &UserId,
        permission: &str,
    ) -> anyhow::Result<bool> {
        let state = self.state.read().await;
        let Some(role_id) = state.user_roles.get(user_id) else {
            return Ok(false);
        };
        Ok(state.role_permissions.iter().any(|(r, p)| {
            r == role_id
                && state
                    .permissions
                    .get(p)
                    .is_some_and(|perm| perm.name == permission)
        }))
    }

    async fn permission_names_for_role(&self, role_id: &RoleId) -> anyhow::Result<Vec<String>> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state
            .role_permissions
            .iter()
            .filter(|(r, _)| r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p).map(|perm| perm.name.clone()))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn permissions_for_role(&self, role_id: &RoleId) -> anyhow::Result<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state
            .role_permissions
            .iter()
            .filter(|(r, _)| r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p).cloned())
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    async fn find_role_by_id(&self, role_id: &RoleId) -> anyhow::Result<Option<Role>> {
        Ok(self.state.read().await.roles.get(role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn find_permission_by_name(&self, name: &str) -> anyhow::Result<Option<Permission>> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn find_existing_permission_ids(
        &self,
        ids: &[PermissionId],
    ) -> anyhow::Result<Vec<PermissionId>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter(|id| state.permissions.contains_key(id))
            .copied()
            .collect())
    }

    async fn insert_role(&self, role: &Role) -> anyhow::Result<()> {
        self.state
            .write()
            .await
            .roles
            .insert(role.id, role.clone());
        Ok(())
    }

    async fn insert_permission(&self, permission: &Permission) -> anyhow::Result<()> {
        self.state
            .write()
            .await
            .permissions
            .insert(permission.id, permission.clone());
        Ok(())
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.state.read().await.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn list_permissions(&self) -> anyhow::Result<Vec<Permission>> {
        let mut permissions: Vec<Permission> = self
            .state
            .read()
            .await
            .permissions
            .values()
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    async fn delete_role(&self, role_id: &RoleId) -> anyhow::Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.roles.remove(role_id).is_some();
        if removed {
            state.role_permissions.retain(|(r, _)| r != role_id);
        }
        Ok(removed)
    }

    async fn delete_permission(&self, permission_id: &PermissionId) -> anyhow::Result<bool> {
        Ok(self
            .state
            .write()
            .await
            .permissions
            .remove(permission_id)
            .is_some())
    }

    async fn assign_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        for permission_id in permission_ids {
            state.role_permissions.insert((*role_id, *permission_id));
        }
        Ok(())
    }

    async fn replace_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        state.role_permissions.retain(|(r, _)| r != role_id);
        for permission_id in permission_ids {
            state.role_permissions.insert((*role_id, *permission_id));
        }
        Ok(())
    }

    async fn count_users_with_role(&self, role_id: &RoleId) -> anyhow::Result<i64> {
        Ok(self
            .state
            .read()
            .await
            .user_roles
            .values()
            .filter(|r| *r == role_id)
            .count() as i64)
    }

    async fn count_roles_with_permission(
        &self,
        permission_id: &PermissionId,
    ) -> anyhow::Result<i64> {
        Ok(self
            .state
            .read()
            .await
            .role_permissions
            .iter()
            .filter(|(_, p)| p == permission_id)
            .count() as i64)
    }
}

/// Postgres-backed role/permission storage.
pub struct PgPermissionBackend {
    pool: PgPool,
}

impl PgPermissionBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn id_strings(ids: &[PermissionId]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[async_trait]
impl PermissionBackend for PgPermissionBackend {
    async fn role_id_for_user(&self, user_id: &UserId) -> anyhow::Result<Option<RoleId>> {
        Ok(role_repo::role_id_for_user(&self.pool, user_id).await?)
    }

    async fn user_has_permission(
        &self,
        user_id: &UserId,
        permission: &str,
    ) -> anyhow::Result<bool> {
        Ok(role_repo::user_has_permission(&self.pool, user_id, permission).await?)
    }

    async fn permission_names_for_role(&self, role_id: &RoleId) -> anyhow::Result<Vec<String>> {
        Ok(role_repo::permission_names_for_role(&self.pool, role_id).await?)
    }

    async fn permissions_for_role(&self, role_id: &RoleId) -> anyhow::Result<Vec<Permission>> {
        Ok(role_repo::permissions_for_role(&self.pool, role_id).await?)
    }

    async fn find_role_by_id(&self, role_id: &RoleId) -> anyhow::Result<Option<Role>> {
        Ok(role_repo::find_role_by_id(&self.pool, role_id).await?)
    }

    async fn find_role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>> {
        Ok(role_repo::find_role_by_name(&self.pool, name).await?)
    }

    async fn find_permission_by_name(&self, name: &str) -> anyhow::Result<Option<Permission>> {
        Ok(role_repo::find_permission_by_name(&self.pool, name).await?)
    }

    async fn find_existing_permission_ids(
        &self,
        ids: &[PermissionId],
    ) -> anyhow::Result<Vec<PermissionId>> {
        let existing =
            role_repo::find_existing_permission_ids(&self.pool, &id_strings(ids)).await?;
        Ok(existing.iter().filter_map(|s| s.parse().ok()).collect())
    }

    async fn insert_role(&self, role: &Role) -> anyhow::Result<()> {
        role_repo::insert_role(&self.pool, role).await?;
        Ok(())
    }

    async fn insert_permission(&self, permission: &Permission) -> anyhow::Result<()> {
        role_repo::insert_permission(&self.pool, permission).await?;
        Ok(())
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        Ok(role_repo::list_roles(&self.pool).await?)
    }

    async fn list_permissions(&self) -> anyhow::Result<Vec<Permission>> {
        Ok(role_repo::list_permissions(&self.pool).await?)
    }

    async fn delete_role(&self, role_id: &RoleId) -> anyhow::Result<bool> {
        Ok(role_repo::delete_role(&self.pool, role_id).await?)
    }

    async fn delete_permission(&self, permission_id: &PermissionId) -> anyhow::Result<bool> {
        Ok(role_repo::delete_permission(&self.pool, permission_id).await?)
    }

    async fn assign_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> anyhow::Result<()> {
        role_repo::assign_role_permissions(&self.pool, role_id, &id_strings(permission_ids))
            .await?;
        Ok(())
    }

    async fn replace_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> anyhow::Result<()> {
        role_repo::replace_role_permissions(&self.pool, role_id, &id_strings(permission_ids))
            .await?;
        Ok(())
    }

    async fn count_users_with_role(&self, role_id: &RoleId) -> anyhow::Result<i64> {
        Ok(role_repo::count_users_with_role(&self.pool, role_id).await?)
    }

    async fn count_roles_with_permission(
        &self,
        permission_id: &PermissionId,
    ) -> anyhow::Result<i64> {
        Ok(role_repo::count_roles_with_permission(&self.pool, permission_id).await?)
    }
}

/// Role/permission evaluation and management. Checks read live state on
/// every call so reassignments take effect immediately; check methods never
/// fail, they fail closed and log.
pub struct PermissionStore {
    backend: Arc<dyn PermissionBackend>,
}

impl PermissionStore {
    pub fn new(backend: Arc<dyn PermissionBackend>) -> Self {
        Self { backend }
    }

    async fn user_permission_names(&self, user_id: &UserId) -> anyhow::Result<Vec<String>> {
        match self.backend.role_id_for_user(user_id).await? {
            Some(role_id) => self.backend.permission_names_for_role(&role_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// True when the user's role grants the named permission. A user without
    /// a role has no permissions. Backend failures log and deny.
    pub async fn check_user_permission(&self, user_id: &UserId, permission: &str) -> bool {
        match self.backend.user_has_permission(user_id, permission).await {
            Ok(granted) => granted,
            Err(err) => {
                tracing::error!(error = ?err, %user_id, permission, "Permission check failed");
                false
            }
        }
    }

    /// Checks that every named permission is granted, reporting the missing
    /// ones.
    pub async fn check_user_all_permissions(
        &self,
        user_id: &UserId,
        permissions: &[String],
    ) -> PermissionCheckResult {
        let granted = match self.user_permission_names(user_id).await {
            Ok(granted) => granted,
            Err(err) => {
                tracing::error!(error = ?err, %user_id, "Permission lookup failed");
                return PermissionCheckResult {
                    has_permission: false,
                    missing: permissions.to_vec(),
                };
            }
        };
        let granted: HashSet<&str> = granted.iter().map(String::as_str).collect();
        let missing: Vec<String> = permissions
            .iter()
            .filter(|p| !granted.contains(p.as_str()))
            .cloned()
            .collect();
        PermissionCheckResult {
            has_permission: missing.is_empty(),
            missing,
        }
    }

    /// True when at least one of the named permissions is granted.
    pub async fn check_user_any_permission(
        &self,
        user_id: &UserId,
        permissions: &[String],
    ) -> bool {
        let granted = match self.user_permission_names(user_id).await {
            Ok(granted) => granted,
            Err(err) => {
                tracing::error!(error = ?err, %user_id, "Permission lookup failed");
                return false;
            }
        };
        let granted: HashSet<&str> = granted.iter().map(String::as_str).collect();
        permissions.iter().any(|p| granted.contains(p.as_str()))
    }

    /// Gate helper for handlers: `Err` carries the missing permission name.
    pub async fn require_permission(
        &self,
        user_id: &UserId,
        permission: &str,
    ) -> Result<(), AuthorizationError> {
        if self.check_user_permission(user_id, permission).await {
            Ok(())
        } else {
            Err(AuthorizationError::new(permission))
        }
    }

    pub async fn create_role(&self, payload: CreateRole) -> Result<Role, RoleError> {
        if self
            .backend
            .find_role_by_name(&payload.name)
            .await?
            .is_some()
        {
            return Err(RoleError::DuplicateRoleName(payload.name));
        }
        let role = Role::new(payload.name, payload.display_name, payload.description);
        self.backend.insert_role(&role).await?;
        Ok(role)
    }

    pub async fn create_permission(
        &self,
        payload: CreatePermission,
    ) -> Result<Permission, RoleError> {
        if self
            .backend
            .find_permission_by_name(&payload.name)
            .await?
            .is_some()
        {
            return Err(RoleError::DuplicatePermissionName(payload.name));
        }
        let permission = Permission::new(payload.name, payload.description);
        self.backend.insert_permission(&permission).await?;
        Ok(permission)
    }

    pub async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        self.backend.list_roles().await
    }

    pub async fn list_permissions(&self) -> anyhow::Result<Vec<Permission>> {
        self.backend.list_permissions().await
    }

    /// Deletes a role. Refused while any user still holds it.
    pub async fn delete_role(&self, role_id: &RoleId) -> Result<(), RoleError> {
        if self.backend.find_role_by_id(role_id).await?.is_none() {
            return Err(RoleError::RoleNotFound);
        }
        if self.backend.count_users_with_role(role_id).await? > 0 {
            return Err(RoleError::RoleInUse);
        }
        self.backend.delete_role(role_id).await?;
        Ok(())
    }

    /// Deletes a permission. Refused while any role still references it.
    pub async fn delete_permission(&self, permission_id: &PermissionId) -> Result<(), RoleError> {
        let existing = self
            .backend
            .find_existing_permission_ids(std::slice::from_ref(permission_id))
            .await?;
        if existing.is_empty() {
            return Err(RoleError::PermissionNotFound);
        }
        if self
            .backend
            .count_roles_with_permission(permission_id)
            .await?
            > 0
        {
            return Err(RoleError::PermissionInUse);
        }
        self.backend.delete_permission(permission_id).await?;
        Ok(())
    }

    /// Adds permissions to a role. Role and every permission must exist
    /// before anything is written; already-assigned permissions are skipped.
    pub async fn assign_permissions_to_role(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<(), RoleError> {
        if self.backend.find_role_by_id(role_id).await?.is_none() {
            return Err(RoleError::RoleNotFound);
        }
        if !self.missing_from(permission_ids).await?.is_empty() {
            return Err(RoleError::PermissionNotFound);
        }
        if permission_ids.is_empty() {
            return Ok(());
        }
        self.backend
            .assign_permissions(role_id, permission_ids)
            .await?;
        Ok(())
    }

    /// Replaces a role's permission set wholesale. Empty input clears it.
    /// Returns the resulting permission list.
    pub async fn replace_role_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<Vec<Permission>, RoleError> {
        if self.backend.find_role_by_id(role_id).await?.is_none() {
            return Err(RoleError::RoleNotFound);
        }
        if !self.missing_from(permission_ids).await?.is_empty() {
            return Err(RoleError::PermissionNotFound);
        }
        self.backend
            .replace_permissions(role_id, permission_ids)
            .await?;
        Ok(self.backend.permissions_for_role(role_id).await?)
    }

    pub async fn get_permissions_by_role_id(
        &self,
        role_id: &RoleId,
    ) -> Result<Vec<Permission>, RoleError> {
        if self.backend.find_role_by_id(role_id).await?.is_none() {
            return Err(RoleError::RoleNotFound);
        }
        Ok(self.backend.permissions_for_role(role_id).await?)
    }

    async fn missing_from(
        &self,
        permission_ids: &[PermissionId],
    ) -> anyhow::Result<Vec<PermissionId>> {
        if permission_ids.is_empty() {
            return Ok(Vec::new());
        }
        let existing: HashSet<PermissionId> = self
            .backend
            .find_existing_permission_ids(permission_ids)
            .await?
            .into_iter()
            .collect();
        Ok(permission_ids
            .iter()
            .filter(|id| !existing.contains(id))
            .copied()
            .collect())
    }
}
