use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Subscription Token API",
        description = "Admin API for issuing, paying, extending and burning subscription tokens.",
        version = "1.0.0",
        license(name = "MIT",)
    ),
    paths(
        crate::routes::health_check,
        // Client lifecycle
        crate::routes::clients::register_client,
        crate::routes::clients::list_clients,
        crate::routes::clients::search_clients,
        crate::routes::clients::list_expiring,
        crate::routes::clients::get_client,
        crate::routes::clients::pay_client,
        crate::routes::clients::extend_client,
        crate::routes::clients::burn_client,
        crate::routes::clients::list_burned,
        crate::routes::clients::get_stats,
        // Operations log
        crate::routes::clients::recent_operations,
    ),
    components(schemas(
        crate::routes::HealthResponse,
        crate::models::RegisterClientRequest,
        crate::models::RegisterClientResponse,
        crate::models::PayRequest,
        crate::models::ExtendRequest,
        crate::models::ExtendResponse,
        crate::models::BurnRequest,
        crate::models::ClientResponse,
        crate::models::ClientListResponse,
        crate::models::BurnedTokenResponse,
        crate::models::BurnedTokenListResponse,
        crate::models::StatsResponse,
        crate::models::OperationResponse,
        crate::models::OperationListResponse,
        crate::error::ApiErrorResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness endpoint"),
        (name = "Clients", description = "Subscription lifecycle endpoints"),
        (name = "Operations", description = "Audit trail of lifecycle operations")
    )
)]
pub struct ApiDoc;

/// Security scheme addon for Bearer token authentication
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Static admin token from ADMIN_API_TOKEN"))
                        .build(),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_client_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/clients"));
        assert!(doc.paths.paths.contains_key("/v1/clients/{token}/burn"));
        assert!(doc.paths.paths.contains_key("/v1/operations"));
    }
}
