#![allow(dead_code)]

use api::{create_router, AppState};
use axum_test::TestServer;
use serde_json::{json, Value};
use services::scheduler::LogNotifier;
use std::sync::Arc;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Create a test server backed by the in-memory store, with admin auth enabled
pub async fn create_test_server() -> TestServer {
    create_test_server_with_token(Some(ADMIN_TOKEN)).await
}

/// Create a test server with an optional admin token
pub async fn create_test_server_with_token(admin_token: Option<&str>) -> TestServer {
    create_test_server_with_storage(&database::Storage::in_memory(), admin_token).await
}

/// Create a test server over an existing store
pub async fn create_test_server_with_storage(
    storage: &database::Storage,
    admin_token: Option<&str>,
) -> TestServer {
    let (app_state, _scheduler) =
        AppState::bootstrap(storage, Arc::new(LogNotifier), admin_token.map(Arc::from))
            .await
            .expect("Failed to bootstrap app state");

    TestServer::new(create_router(app_state)).expect("Failed to create test server")
}

pub fn auth_header() -> (http::HeaderName, http::HeaderValue) {
    (
        http::HeaderName::from_static("authorization"),
        http::HeaderValue::from_str(&format!("Bearer {ADMIN_TOKEN}")).unwrap(),
    )
}

/// Register a client and return the issued token
pub async fn register(server: &TestServer, name: &str, profile: &str, duration: &str) -> String {
    let (name_header, value) = auth_header();
    let response = server
        .post("/v1/clients")
        .add_header(name_header, value)
        .json(&json!({
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "profile": profile,
            "duration": duration,
        }))
        .await;

    assert_eq!(response.status_code(), 201, "register failed: {}", response.text());
    let body: Value = response.json();
    body["token"].as_str().unwrap().to_string()
}
