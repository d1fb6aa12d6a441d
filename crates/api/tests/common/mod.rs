#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use fleetwatch_api::auth::jwt::{generate_access_token, JwtConfig};
use fleetwatch_api::config::ServerConfig;
use fleetwatch_api::router::build_app_router;
use fleetwatch_api::state::{AppState, Services};
use fleetwatch_core::types::DbId;
use fleetwatch_db::models::user::UserContact;
use fleetwatch_events::{AlertHub, MemoryBackend, NotifierConfig, ScannerConfig};
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Application wired over the in-memory backend.
pub struct TestApp {
    pub router: Router,
    pub backend: Arc<MemoryBackend>,
    pub state: AppState,
}

/// Build the full application router, with the production middleware
/// stack, over a fresh [`MemoryBackend`]. Users 1 through 9 exist as
/// employees; tests re-register them to change roles.
pub fn build_test_app() -> TestApp {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_recipients(1..=9);
    let state = AppState::assemble(
        test_config(),
        Services {
            backend: backend.clone(),
            pool: None,
            hub: Arc::new(AlertHub::default()),
            notifier: NotifierConfig::default(),
            scanner: ScannerConfig::default(),
            email: None,
        },
    );
    TestApp {
        router: build_app_router(state.clone()),
        backend,
        state,
    }
}

/// Register a user in the directory.
pub fn add_user(backend: &MemoryBackend, id: DbId, role: &str) {
    backend.add_user(UserContact {
        id,
        email: format!("user{id}@fleet.test"),
        full_name: Some(format!("User {id}")),
        role: role.to_string(),
    });
}

pub fn token(user_id: DbId, role: &str) -> String {
    generate_access_token(user_id, role, &test_config().jwt).unwrap()
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
