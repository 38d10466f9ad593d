use sqlx::PgPool;

use crate::models::role::{Permission, Role};
use crate::types::{PermissionId, RoleId, UserId};

pub async fn insert_role(pool: &PgPool, role: &Role) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO roles (id, name, display_name, description, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&role.id)
    .bind(&role.name)
    .bind(&role.display_name)
    .bind(&role.description)
    .bind(role.created_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn insert_permission(pool: &PgPool, permission: &Permission) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO permissions (id, name, description, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&permission.id)
    .bind(&permission.name)
    .bind(&permission.description)
    .bind(permission.created_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn find_role_by_id(pool: &PgPool, role_id: &RoleId) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "SELECT id, name, display_name, description, created_at FROM roles WHERE id = $1",
    )
    .bind(role_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_role_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "SELECT id, name, display_name, description, created_at FROM roles WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn find_permission_by_name(
    pool: &PgPool,
    name: &str,
) -> Result<Option<Permission>, sqlx::Error> {
    sqlx::query_as::<_, Permission>(
        "SELECT id, name, description, created_at FROM permissions WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn list_roles(pool: &PgPool) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "SELECT id, name, display_name, description, created_at FROM roles ORDER BY name",
    )
    .fetch_all(pool)
    .await
}

pub async fn list_permissions(pool: &PgPool) -> Result<Vec<Permission>, sqlx::Error> {
    sqlx::query_as::<_, Permission>(
        "SELECT id, name, description, created_at FROM permissions ORDER BY name",
    )
    .fetch_all(pool)
    .await
}

pub async fn delete_role(pool: &PgPool, role_id: &RoleId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(role_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_permission(
    pool: &PgPool,
    permission_id: &PermissionId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
        .bind(permission_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_existing_permission_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM permissions WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub async fn role_id_for_user(
    pool: &PgPool,
    user_id: &UserId,
) -> Result<Option<RoleId>, sqlx::Error> {
    let row: Option<(Option<RoleId>,)> =
        sqlx::query_as("SELECT role_id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|r| r.0))
}

pub async fn user_has_permission(
    pool: &PgPool,
    user_id: &UserId,
    permission: &str,
) -> Result<bool, sqlx::Error> {
    let exists: Option<(i32,)> = sqlx::query_as(
        r#"
        SELECT 1
        FROM users u
        INNER JOIN role_permissions rp ON rp.role_id = u.role_id
        INNER JOIN permissions p ON p.id = rp.permission_id
        WHERE u.id = $1 AND p.name = $2
        "#,
    )
    .bind(user_id)
    .bind(permission)
    .fetch_optional(pool)
    .await?;
    Ok(exists.is_some())
}

pub async fn permission_names_for_role(
    pool: &PgPool,
    role_id: &RoleId,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT p.name
        FROM permissions p
        INNER JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
}

pub async fn permissions_for_role(
    pool: &PgPool,
    role_id: &RoleId,
) -> Result<Vec<Permission>, sqlx::Error> {
    sqlx::query_as::<_, Permission>(
        r#"
        SELECT p.id, p.name, p.description, p.created_at
        FROM permissions p
        INNER JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
}

/// Adds associations, skipping any that already exist.
pub async fn assign_role_permissions(
    pool: &PgPool,
    role_id: &RoleId,
    permission_ids: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id)
        SELECT $1, unnest($2::text[])
        ON CONFLICT (role_id, permission_id) DO NOTHING
        "#,
    )
    .bind(role_id)
    .bind(permission_ids)
    .execute(pool)
    .await
    .map(|_| ())
}

/// Clear-then-insert inside one transaction. An empty id list leaves the
/// role with no permissions.
pub async fn replace_role_permissions(
    pool: &PgPool,
    role_id: &RoleId,
    permission_ids: &[String],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

    if !permission_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, unnest($2::text[])
            "#,
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn count_users_with_role(pool: &PgPool, role_id: &RoleId) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
        .bind(role_id)
        .fetch_one(pool)
        .await
}

pub async fn count_roles_with_permission(
    pool: &PgPool,
    permission_id: &PermissionId,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM role_permissions WHERE permission_id = $1")
        .bind(permission_id)
        .fetch_one(pool)
        .await
}
