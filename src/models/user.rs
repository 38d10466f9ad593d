//! Models for user accounts and authentication payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{RoleId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Database representation of a user account.
pub struct User {
    /// Unique identifier for the user.
    pub id: UserId,
    /// Immutable email address used for login.
    pub email: String,
    /// Argon2 hash of the user's password.
    pub password_hash: String,
    /// Human-readable full name.
    pub full_name: String,
    /// Role granted to the user, if any.
    pub role_id: Option<RoleId>,
    /// Creation timestamp for auditing.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp for auditing.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// A user joined with the name of their role, as authentication needs it.
pub struct UserWithRole {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: User,
    /// Name of the user's role, `None` when no role is assigned.
    pub role_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Credentials submitted by a user attempting to authenticate.
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    /// Extends the session lifetime when set.
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Tokens and session identity returned after a successful login.
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub session_id: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Public-facing representation of a user returned by the API.
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Option<String>,
}

impl From<UserWithRole> for UserResponse {
    fn from(user: UserWithRole) -> Self {
        UserResponse {
            id: user.user.id.to_string(),
            email: user.user.email,
            full_name: user.user.full_name,
            role: user.role_name,
        }
    }
}

impl User {
    /// Constructs a new user with a freshly generated identifier.
    pub fn new(
        email: String,
        password_hash: String,
        full_name: String,
        role_id: Option<RoleId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email,
            password_hash,
            full_name,
            role_id,
            created_at: now,
            updated_at: now,
        }
    }
}
