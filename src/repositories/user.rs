//! Repository functions for user lookups.

use sqlx::PgPool;

use crate::models::user::{User, UserWithRole};
use crate::types::UserId;

/// Finds a user by email, joined with their role name.
pub async fn find_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserWithRole>, sqlx::Error> {
    sqlx::query_as::<_, UserWithRole>(
        "SELECT u.id, u.email, u.password_hash, u.full_name, u.role_id, u.created_at, \
         u.updated_at, r.name AS role_name \
         FROM users u LEFT JOIN roles r ON r.id = u.role_id \
         WHERE u.email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// Finds a user by id, joined with their role name.
pub async fn find_user_by_id(
    pool: &PgPool,
    user_id: &UserId,
) -> Result<Option<UserWithRole>, sqlx::Error> {
    sqlx::query_as::<_, UserWithRole>(
        "SELECT u.id, u.email, u.password_hash, u.full_name, u.role_id, u.created_at, \
         u.updated_at, r.name AS role_name \
         FROM users u LEFT JOIN roles r ON r.id = u.role_id \
         WHERE u.id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Inserts a new user row.
pub async fn insert_user(pool: &PgPool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, full_name, role_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(&user.role_id)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}
