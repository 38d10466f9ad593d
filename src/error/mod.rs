use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Login failures. Unknown email and wrong password are deliberately
/// indistinguishable to callers.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Session-lifecycle failures. Every kind maps to 401 at the boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is invalid or has expired")]
    SessionInvalid,
    #[error("Session ID is required")]
    SessionIdMissing,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Token refresh failed")]
    TokenRefreshFailed(#[source] anyhow::Error),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::SessionInvalid => "SESSION_INVALID",
            SessionError::SessionIdMissing => "SESSION_ID_MISSING",
            SessionError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            SessionError::TokenRefreshFailed(_) => "TOKEN_REFRESH_FAILED",
        }
    }
}

/// A permission check failed: authenticated, but not allowed (403).
#[derive(Debug, Error)]
#[error("Missing required permission: {permission}")]
pub struct AuthorizationError {
    pub permission: String,
}

impl AuthorizationError {
    pub fn new(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
        }
    }
}

/// Role/permission management failures. Existence and uniqueness are checked
/// before any mutating side effect, so these surface before a write happens.
#[derive(Debug, Error)]
pub enum RoleError {
    #[error("Role with name '{0}' already exists")]
    DuplicateRoleName(String),
    #[error("Permission with name '{0}' already exists")]
    DuplicatePermissionName(String),
    #[error("Role not found")]
    RoleNotFound,
    #[error("One or more permissions not found")]
    PermissionNotFound,
    #[error("Role is still assigned to one or more users")]
    RoleInUse,
    #[error("Permission is still assigned to one or more roles")]
    PermissionInUse,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized { code: &'static str, message: String },
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl AppError {
    /// Generic 401 without a domain-specific code.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code: "UNAUTHORIZED",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND".to_string(), None),
            AppError::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, message, code.to_string(), None)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN".to_string(), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT".to_string(), None),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                "BAD_REQUEST".to_string(),
                None,
            ),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::InternalServerError(err.into()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Unauthorized {
                code: "INVALID_CREDENTIALS",
                message: err.to_string(),
            },
            AuthError::Internal(source) => AppError::InternalServerError(source),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        if let SessionError::TokenRefreshFailed(source) = &err {
            tracing::error!(error = ?source, "Token refresh failed");
        }
        AppError::Unauthorized {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<AuthorizationError> for AppError {
    fn from(err: AuthorizationError) -> Self {
        AppError::Forbidden(err.to_string())
    }
}

impl From<RoleError> for AppError {
    fn from(err: RoleError) -> Self {
        match err {
            RoleError::DuplicateRoleName(_) | RoleError::DuplicatePermissionName(_) => {
                AppError::Conflict(err.to_string())
            }
            RoleError::RoleNotFound | RoleError::PermissionNotFound => {
                AppError::NotFound(err.to_string())
            }
            RoleError::RoleInUse | RoleError::PermissionInUse => AppError::Conflict(err.to_string()),
            RoleError::Internal(source) => AppError::InternalServerError(source),
        }
    }
}
