pub mod clients;

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::{
    middleware::{admin_auth_middleware, AdminAuthState},
    openapi::ApiDoc,
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// API version
    pub version: &'static str,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the main API router
pub fn create_router(app_state: AppState) -> Router {
    let auth_state = AdminAuthState {
        api_token: app_state.admin_token.clone(),
    };

    // Admin routes (bearer token when configured)
    let client_routes = clients::create_clients_router()
        .layer(from_fn_with_state(auth_state, admin_auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(client_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
