//! End-to-end gate behavior over a test router: status codes, body shapes,
//! and the browser/machine split, without a database. The stub extension
//! layer stands in for the session middleware, which is all the gate sees of
//! it in production too.

use axum::{
    Extension, Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    routing::{get, post},
};
use http_body_util::BodyExt;
use platform_authz::{PermissionLevel, Policy, Principal, Role};
use serde_json::Value;
use server::gate::PolicyLayer;
use tower::ServiceExt;
use uuid::Uuid;

const AUTHENTICATED: &[Policy] = &[Policy::None];
const WRITE_GATED: &[Policy] = &[Policy::None, Policy::Write];
const ADMIN_GATED: &[Policy] = &[Policy::None, Policy::Admin];
const SUPERVISOR_GATED: &[Policy] = &[Policy::None, Policy::Supervisor];
const ADMIN_AND_WRITE: &[Policy] = &[Policy::Admin, Policy::Write];

async fn ok() -> &'static str {
    "ok"
}

fn app(principal: Option<Principal>) -> Router {
    let router = Router::new()
        .route(
            "/api/records",
            get(ok)
                .post(ok)
                .route_layer(PolicyLayer::new(WRITE_GATED)),
        )
        .route(
            "/api/admin",
            post(ok).route_layer(PolicyLayer::new(ADMIN_GATED)),
        )
        .route(
            "/api/analytics",
            get(ok).route_layer(PolicyLayer::new(SUPERVISOR_GATED)),
        )
        .route(
            "/api/composite",
            post(ok).route_layer(PolicyLayer::new(ADMIN_AND_WRITE)),
        )
        .route(
            "/dashboard",
            get(ok).route_layer(PolicyLayer::new(AUTHENTICATED)),
        )
        .route(
            "/admin-page",
            get(ok).route_layer(PolicyLayer::new(ADMIN_GATED)),
        );
    match principal {
        Some(principal) => router.layer(Extension(principal)),
        None => router,
    }
}

fn principal(role: Role, permission_level: PermissionLevel) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        role,
        permission_level,
    }
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn admin_route_admits_admin() {
    let app = app(Some(principal(Role::Admin, PermissionLevel::Edit)));
    let response = app
        .oneshot(request(Method::POST, "/api/admin"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_route_denies_lower_roles_with_role_code() {
    for role in [Role::Supervisor, Role::User] {
        let app = app(Some(principal(role, PermissionLevel::Edit)));
        let response = app
            .oneshot(request(Method::POST, "/api/admin"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"], "INSUFFICIENT_ROLE");
        assert_eq!(body["message"], "Access denied. Admin role required.");
    }
}

#[tokio::test]
async fn supervisor_route_admits_supervisor_and_admin() {
    for role in [Role::Admin, Role::Supervisor] {
        let app = app(Some(principal(role, PermissionLevel::View)));
        let response = app
            .oneshot(request(Method::GET, "/api/analytics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let app = app(Some(principal(Role::User, PermissionLevel::Edit)));
    let response = app
        .oneshot(request(Method::GET, "/api/analytics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"], "INSUFFICIENT_ROLE");
}

#[tokio::test]
async fn editing_user_can_post_write_gated_route() {
    let app = app(Some(principal(Role::User, PermissionLevel::Edit)));
    let response = app
        .oneshot(request(Method::POST, "/api/records"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn view_only_admin_is_denied_writes() {
    let app = app(Some(principal(Role::Admin, PermissionLevel::View)));
    let response = app
        .oneshot(request(Method::POST, "/api/records"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"], "INSUFFICIENT_PERMISSIONS");
    assert_eq!(
        body["message"],
        "Access denied. You have view-only permissions."
    );
}

#[tokio::test]
async fn reads_are_never_blocked_by_write_gating() {
    let app = app(Some(principal(Role::User, PermissionLevel::View)));
    let response = app
        .oneshot(request(Method::GET, "/api/records"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_api_request_gets_401_not_403() {
    let app = app(None);
    let response = app
        .oneshot(request(Method::POST, "/api/records"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn composite_surfaces_first_failing_component() {
    let app = app(Some(principal(Role::Supervisor, PermissionLevel::Edit)));
    let response = app
        .oneshot(request(Method::POST, "/api/composite"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"], "INSUFFICIENT_ROLE");
}

#[tokio::test]
async fn unauthenticated_browser_navigation_redirects_to_login() {
    let app = app(None);
    let response = app
        .oneshot(request(Method::GET, "/dashboard"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login"
    );
}

#[tokio::test]
async fn authorized_browser_navigation_passes_through() {
    let app = app(Some(principal(Role::User, PermissionLevel::View)));
    let response = app
        .oneshot(request(Method::GET, "/dashboard"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn forbidden_browser_navigation_renders_forbidden_page() {
    let app = app(Some(principal(Role::User, PermissionLevel::Edit)));
    let response = app
        .oneshot(request(Method::GET, "/admin-page"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8_lossy(&bytes);
    assert!(page.contains("403 Forbidden"));
}

#[tokio::test]
async fn accept_header_selects_structured_denial_outside_api_paths() {
    let app = app(Some(principal(Role::User, PermissionLevel::Edit)));
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/admin-page")
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"], "INSUFFICIENT_ROLE");
}

#[tokio::test]
async fn same_request_evaluates_identically_on_retry() {
    let principal = principal(Role::Supervisor, PermissionLevel::View);
    for _ in 0..2 {
        let app = app(Some(principal.clone()));
        let response = app
            .oneshot(request(Method::POST, "/api/records"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"], "INSUFFICIENT_PERMISSIONS");
    }
}
