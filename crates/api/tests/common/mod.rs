//! Shared fixtures for HTTP-level integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use hserp_api::auth::jwt::JwtConfig;
use hserp_api::auth::password::hash_password;
use hserp_api::config::{AppMode, RbacConfig, ServerConfig};
use hserp_api::router::build_app_router;
use hserp_api::state::AppState;
use hserp_db::models::{Permission, Role, User, STATUS_ACTIVE};
use hserp_db::record::Record;
use hserp_db::repositories::{RbacRepo, UserRepo};
use hserp_db::DbPool;

pub const PASSWORD: &str = "correct-horse-battery";
pub const SUPER_ACCOUNT: &str = "root";

/// A `ServerConfig` for tests.
///
/// Debouncing is off (a zero window); tests that exercise it build their
/// own config.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        app_mode: AppMode::Release,
        debounce_window_ms: 0,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            expiry_hours: 1,
        },
        rbac: RbacConfig {
            super_account: SUPER_ACCOUNT.to_string(),
            ..Default::default()
        },
    }
}

/// The production router over `pool` with [`test_config`].
pub fn build_test_app(pool: DbPool) -> Router {
    build_test_app_with(pool, test_config())
}

pub fn build_test_app_with(pool: DbPool, config: ServerConfig) -> Router {
    let state = AppState::new(pool, config.clone());
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, request(Method::GET, uri, None, None)).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response {
    send(app, request(Method::GET, uri, Some(token), None)).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, request(Method::POST, uri, None, Some(body))).await
}

pub async fn post_json_auth(app: &Router, uri: &str, token: &str, body: serde_json::Value) -> Response {
    send(app, request(Method::POST, uri, Some(token), Some(body))).await
}

pub async fn post_auth(app: &Router, uri: &str, token: &str) -> Response {
    send(app, request(Method::POST, uri, Some(token), None)).await
}

pub async fn delete_auth(app: &Router, uri: &str, token: &str) -> Response {
    send(app, request(Method::DELETE, uri, Some(token), None)).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and envelope code, returning the envelope.
pub async fn expect_status(response: Response, status: StatusCode, code: &str) -> serde_json::Value {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "unexpected envelope: {json}");
    json
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

/// Insert an active user whose password is [`PASSWORD`].
pub async fn create_user(pool: &DbPool, username: &str) -> User {
    let mut user = User {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: hash_password(PASSWORD).unwrap(),
        status: STATUS_ACTIVE,
        ..Default::default()
    };
    UserRepo::create(pool, &mut user).await.unwrap();
    user
}

/// Log in through the API and return the session token.
pub async fn login(app: &Router, username: &str) -> String {
    let response = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "username": username, "password": PASSWORD }),
    )
    .await;
    let json = expect_status(response, StatusCode::OK, "OK").await;
    json["data"]["token"].as_str().unwrap().to_string()
}

/// Create a user, give it one role holding the given grants, and log in.
pub async fn user_with_grants(
    app: &Router,
    pool: &DbPool,
    username: &str,
    grants: &[(&str, &str)],
) -> (User, String) {
    let user = create_user(pool, username).await;
    let role = role_with_grants(pool, &format!("{username}-role"), grants).await;
    RbacRepo::assign_roles_to_user(pool, user.meta.id, &[role.meta.id])
        .await
        .unwrap();
    let token = login(app, username).await;
    (user, token)
}

/// Create a role holding a permission per `(path, method)` grant.
pub async fn role_with_grants(pool: &DbPool, name: &str, grants: &[(&str, &str)]) -> Role {
    let mut role = Role {
        name: name.to_string(),
        status: 1,
        ..Default::default()
    };
    RbacRepo::create_role(pool, &mut role).await.unwrap();

    let mut ids = Vec::new();
    for (path, method) in grants {
        ids.push(permission(pool, path, method).await.meta.id);
    }
    RbacRepo::assign_permissions_to_role(pool, role.meta.id, &ids)
        .await
        .unwrap();
    role
}

/// Find or create the permission for `(path, method)`.
pub async fn permission(pool: &DbPool, path: &str, method: &str) -> Permission {
    let mut permission = Permission {
        name: format!("{path}#{method}"),
        path: path.to_string(),
        method: method.to_string(),
        ..Default::default()
    };
    Record::<Permission>::new(pool)
        .filter("name = ?", (permission.name.clone(),))
        .first_or_create(&mut permission)
        .await
        .unwrap();
    permission
}
