pub mod error;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiErrorResponse};
pub use middleware::{admin_auth_middleware, AdminAuthState};
pub use models::*;
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
