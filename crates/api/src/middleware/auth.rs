use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::ApiError;

/// State for the admin authentication middleware
#[derive(Clone)]
pub struct AdminAuthState {
    pub api_token: Option<Arc<str>>,
}

/// Extract the bearer token from the Authorization header
fn extract_token_from_request(request: &Request) -> Result<&str, ApiError> {
    let auth_value = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("No authorization header found");
            ApiError::missing_auth_header()
        })?;

    auth_value.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!("Authorization header does not start with 'Bearer '");
        ApiError::invalid_auth_header()
    })
}

/// Compare digests so the comparison does not depend on where the tokens differ
fn token_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Admin authentication middleware.
///
/// With no token configured every request passes; startup logs a warning once.
pub async fn admin_auth_middleware(
    State(state): State<AdminAuthState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        tracing::debug!("Admin token not configured, allowing {}", request.uri().path());
        return Ok(next.run(request).await);
    };

    let token = extract_token_from_request(&request)?;
    if !token_matches(token, expected) {
        tracing::warn!("Rejected admin request to {}: token mismatch", request.uri().path());
        return Err(ApiError::invalid_admin_token());
    }

    Ok(next.run(request).await)
}
