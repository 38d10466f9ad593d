//! Shared fixtures for API tests: an in-memory application state, seeded
//! users and roles, and small helpers for driving the router with
//! `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use hireflow_backend::config::Config;
use hireflow_backend::middleware::request_id;
use hireflow_backend::models::role::{CreatePermission, CreateRole, Role};
use hireflow_backend::models::user::{User, UserWithRole};
use hireflow_backend::routes;
use hireflow_backend::services::audit_log::{AuditLogEntry, AuditLogServiceTrait};
use hireflow_backend::services::auth::UserDirectory;
use hireflow_backend::services::permission::MemoryPermissionBackend;
use hireflow_backend::services::session_store::MemorySessionBackend;
use hireflow_backend::state::AppState;
use hireflow_backend::types::UserId;
use hireflow_backend::utils::password::hash_password;

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test-secret".to_string(),
        access_token_ttl_minutes: 5,
        session_ttl_minutes: 15,
        remember_me_ttl_days: 30,
        refresh_threshold_percent: 20,
        audit_log_retention_days: 365,
        port: 0,
    }
}

/// User lookup over a plain vector, standing in for the users table.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<Vec<UserWithRole>>,
}

impl MemoryUserDirectory {
    pub fn add(&self, user: UserWithRole) {
        self.users.lock().unwrap().push(user);
    }

    pub fn remove(&self, user_id: &UserId) {
        self.users.lock().unwrap().retain(|u| &u.user.id != user_id);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserWithRole>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, user_id: &UserId) -> anyhow::Result<Option<UserWithRole>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| &u.user.id == user_id)
            .cloned())
    }
}

/// Audit sink that keeps every entry for later assertions.
#[derive(Default)]
pub struct RecordingAuditLog {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl RecordingAuditLog {
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLogServiceTrait for RecordingAuditLog {
    async fn record_event(&self, entry: AuditLogEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// Audit sink that always fails, for verifying best-effort semantics.
pub struct FailingAuditLog;

#[async_trait]
impl AuditLogServiceTrait for FailingAuditLog {
    async fn record_event(&self, _entry: AuditLogEntry) -> anyhow::Result<()> {
        anyhow::bail!("audit sink unavailable")
    }
}

pub fn state_with_audit(
    audit: Arc<dyn AuditLogServiceTrait>,
) -> (AppState, Arc<MemoryUserDirectory>, Arc<MemoryPermissionBackend>) {
    let users = Arc::new(MemoryUserDirectory::default());
    let permission_backend = Arc::new(MemoryPermissionBackend::new());
    let state = AppState::new(
        test_config(),
        Arc::new(MemorySessionBackend::new()),
        permission_backend.clone(),
        users.clone(),
        audit,
    );
    (state, users, permission_backend)
}

/// The application wired over in-memory backends, plus handles to them.
pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserDirectory>,
    pub permission_backend: Arc<MemoryPermissionBackend>,
    pub audit: Arc<RecordingAuditLog>,
}

impl TestApp {
    pub fn new() -> Self {
        let audit = Arc::new(RecordingAuditLog::default());
        let (state, users, permission_backend) = state_with_audit(audit.clone());
        Self {
            state,
            users,
            permission_backend,
            audit,
        }
    }

    /// The production route table with the request id layer, as main wires it.
    pub fn router(&self) -> Router {
        routes::api_router(self.state.clone())
            .layer(axum::middleware::from_fn(request_id::request_id))
    }

    pub async fn seed_user(&self, email: &str, password: &str) -> UserWithRole {
        let user = UserWithRole {
            user: User::new(
                email.to_string(),
                hash_password(password).unwrap(),
                "Test User".to_string(),
                None,
            ),
            role_name: None,
        };
        self.users.add(user.clone());
        user
    }

    pub async fn seed_user_with_role(
        &self,
        email: &str,
        password: &str,
        role: &Role,
    ) -> UserWithRole {
        let user = UserWithRole {
            user: User::new(
                email.to_string(),
                hash_password(password).unwrap(),
                "Test User".to_string(),
                Some(role.id),
            ),
            role_name: Some(role.name.clone()),
        };
        self.users.add(user.clone());
        self.permission_backend
            .set_user_role(user.user.id, Some(role.id))
            .await;
        user
    }

    /// Creates a role carrying the named permissions, reusing permissions
    /// that already exist.
    pub async fn seed_role(&self, name: &str, permissions: &[&str]) -> Role {
        let role = self
            .state
            .permissions
            .create_role(CreateRole {
                name: name.to_string(),
                display_name: name.replace('_', " "),
                description: None,
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for permission in permissions {
            ids.push(self.ensure_permission(permission).await);
        }
        if !ids.is_empty() {
            self.state
                .permissions
                .assign_permissions_to_role(&role.id, &ids)
                .await
                .unwrap();
        }
        role
    }

    pub async fn ensure_permission(&self, name: &str) -> hireflow_backend::types::PermissionId {
        let created = self
            .state
            .permissions
            .create_permission(CreatePermission {
                name: name.to_string(),
                description: None,
            })
            .await;
        match created {
            Ok(permission) => permission.id,
            Err(_) => self
                .state
                .permissions
                .list_permissions()
                .await
                .unwrap()
                .into_iter()
                .find(|p| p.name == name)
                .unwrap()
                .id,
        }
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is json")
    }
}

/// Logs in through the API and returns the parsed response body.
pub async fn login(router: &Router, email: &str, password: &str) -> Value {
    let response = send(
        router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

/// Spawned audit tasks need a tick of the runtime to land.
pub async fn drain_background_tasks() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
