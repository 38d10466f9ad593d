use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hireflow_backend::docs;

fn swagger_router() -> Router {
    let openapi = docs::ApiDoc::openapi();
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi))
}

#[test]
fn openapi_documents_every_endpoint() {
    let openapi = docs::ApiDoc::openapi();
    let json = serde_json::to_value(&openapi).expect("serialize openapi");

    let paths = json
        .get("paths")
        .and_then(|v| v.as_object())
        .expect("paths object");
    for path in [
        "/api/auth/login",
        "/api/auth/refresh",
        "/api/auth/logout",
        "/api/auth/session",
        "/api/auth/revoke",
        "/api/admin/roles",
        "/api/admin/roles/{id}",
        "/api/admin/roles/{id}/permissions",
        "/api/admin/permissions",
        "/api/admin/permissions/{id}",
        "/api/admin/sessions/stats",
    ] {
        assert!(paths.contains_key(path), "missing path {path}");
    }
}

#[test]
fn openapi_declares_the_bearer_scheme() {
    let openapi = docs::ApiDoc::openapi();
    let json = serde_json::to_value(&openapi).expect("serialize openapi");

    let bearer = json
        .pointer("/components/securitySchemes/BearerAuth")
        .expect("BearerAuth scheme");
    assert_eq!(bearer.get("type").and_then(Value::as_str), Some("http"));
    assert_eq!(bearer.get("scheme").and_then(Value::as_str), Some("bearer"));
    assert_eq!(
        bearer.get("bearerFormat").and_then(Value::as_str),
        Some("JWT")
    );

    // Login and refresh opt out of the global bearer requirement.
    for path in ["/api/auth/login", "/api/auth/refresh"] {
        let pointer = format!("/paths/{}/post/security/0", path.replace('/', "~1"));
        assert_eq!(json.pointer(&pointer), Some(&json!({})), "path {path}");
    }
}

#[tokio::test]
async fn swagger_ui_routes_respond() {
    let app = swagger_router();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/docs")
                .body(Body::empty())
                .expect("build docs request"),
        )
        .await
        .expect("call swagger ui");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(location, "/docs/");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/docs/swagger-initializer.js")
                .body(Body::empty())
                .expect("build swagger initializer request"),
        )
        .await
        .expect("call swagger initializer");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read initializer body");
    assert!(String::from_utf8_lossy(&body).contains("SwaggerUIBundle"));
}

#[tokio::test]
async fn openapi_json_route_serves_the_document() {
    let app = swagger_router();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .expect("build openapi request"),
        )
        .await
        .expect("call openapi route");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let document: Value = serde_json::from_slice(&bytes).expect("openapi json");
    assert!(document.get("openapi").is_some());
}
