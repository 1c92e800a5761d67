use crate::{
    error::ApiError,
    models::{
        BurnRequest, BurnedTokenListResponse, BurnedTokenResponse, ClientListResponse,
        ClientResponse, ExpiringParams, ExtendRequest, ExtendResponse, ListClientsParams,
        OperationListResponse, OperationResponse, PayRequest, RecentOperationsParams,
        RegisterClientRequest, RegisterClientResponse, SearchParams, StatsResponse,
    },
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use services::subscription::parse_token;

/// Rejects path tokens that could never have been issued, before touching the store
fn check_token_format(token: &str) -> Result<(), ApiError> {
    match parse_token(token) {
        Some(_) => Ok(()),
        None => Err(ApiError::bad_request(format!("Malformed token: {token}"))
            .with_details("Tokens look like NFX-AB2C-4821-<profile>")),
    }
}

/// Register a client
///
/// Issues a fresh token and schedules its expiration notice.
#[utoipa::path(
    post,
    path = "/v1/clients",
    tag = "Clients",
    request_body = RegisterClientRequest,
    responses(
        (status = 201, description = "Token issued", body = RegisterClientResponse),
        (status = 400, description = "Invalid name, profile or duration", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 503, description = "Store unavailable or token space exhausted", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn register_client(
    State(app_state): State<AppState>,
    Json(req): Json<RegisterClientRequest>,
) -> Result<(StatusCode, Json<RegisterClientResponse>), ApiError> {
    tracing::info!(
        "Registering client: profile={}, duration={}",
        req.profile,
        req.duration
    );

    let registration = app_state
        .subscription_service
        .register(&req.name, &req.email, &req.profile, &req.duration)
        .await?;

    Ok((StatusCode::CREATED, Json(registration.into())))
}

/// List clients
#[utoipa::path(
    get,
    path = "/v1/clients",
    tag = "Clients",
    params(ListClientsParams),
    responses(
        (status = 200, description = "Client records", body = ClientListResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    Query(params): Query<ListClientsParams>,
) -> Result<Json<ClientListResponse>, ApiError> {
    let records = if params.unpaid {
        app_state.subscription_service.list_unpaid().await?
    } else {
        app_state.subscription_service.list_all().await?
    };

    Ok(Json(ClientListResponse::from_records(records)))
}

/// Search clients by token, name, email or profile
#[utoipa::path(
    get,
    path = "/v1/clients/search",
    tag = "Clients",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching records", body = ClientListResponse),
        (status = 400, description = "Empty query", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn search_clients(
    State(app_state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ClientListResponse>, ApiError> {
    let records = app_state.subscription_service.search(&params.q).await?;
    Ok(Json(ClientListResponse::from_records(records)))
}

/// List clients whose end falls within the next `days` days
#[utoipa::path(
    get,
    path = "/v1/clients/expiring",
    tag = "Clients",
    params(ExpiringParams),
    responses(
        (status = 200, description = "Expiring records", body = ClientListResponse),
        (status = 400, description = "Negative window", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn list_expiring(
    State(app_state): State<AppState>,
    Query(params): Query<ExpiringParams>,
) -> Result<Json<ClientListResponse>, ApiError> {
    let records = app_state
        .subscription_service
        .list_expiring(params.days)
        .await?;
    Ok(Json(ClientListResponse::from_records(records)))
}

/// Get a client by token
#[utoipa::path(
    get,
    path = "/v1/clients/{token}",
    tag = "Clients",
    params(
        ("token" = String, Path, description = "Subscription token")
    ),
    responses(
        (status = 200, description = "Client record", body = ClientResponse),
        (status = 400, description = "Malformed token", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Token not found", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Stored record is corrupted", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    check_token_format(&token)?;
    let record = app_state.subscription_service.get_client(&token).await?;
    Ok(Json(ClientResponse::from_record(record, Utc::now())))
}

/// Mark a client as paid
#[utoipa::path(
    post,
    path = "/v1/clients/{token}/pay",
    tag = "Clients",
    params(
        ("token" = String, Path, description = "Subscription token")
    ),
    request_body = PayRequest,
    responses(
        (status = 200, description = "Updated record", body = ClientResponse),
        (status = 400, description = "Negative amount or malformed token", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Token not found", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn pay_client(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<PayRequest>,
) -> Result<Json<ClientResponse>, ApiError> {
    check_token_format(&token)?;
    tracing::info!("Marking token {} as paid", token);

    let record = app_state
        .subscription_service
        .pay(&token, req.amount)
        .await?;
    Ok(Json(ClientResponse::from_record(record, Utc::now())))
}

/// Extend a subscription by whole days
#[utoipa::path(
    post,
    path = "/v1/clients/{token}/extend",
    tag = "Clients",
    params(
        ("token" = String, Path, description = "Subscription token")
    ),
    request_body = ExtendRequest,
    responses(
        (status = 200, description = "New end date", body = ExtendResponse),
        (status = 400, description = "Days must be positive or malformed token", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Token not found", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn extend_client(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ExtendRequest>,
) -> Result<Json<ExtendResponse>, ApiError> {
    check_token_format(&token)?;
    tracing::info!("Extending token {} by {} days", token, req.days);

    let end = app_state
        .subscription_service
        .extend(&token, req.days)
        .await?;
    Ok(Json(ExtendResponse { token, end }))
}

/// Burn a token
///
/// Revocation is permanent; a second burn of the same token is rejected.
#[utoipa::path(
    post,
    path = "/v1/clients/{token}/burn",
    tag = "Clients",
    params(
        ("token" = String, Path, description = "Subscription token")
    ),
    request_body = BurnRequest,
    responses(
        (status = 200, description = "Burned record", body = ClientResponse),
        (status = 400, description = "Missing reason or malformed token", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Token not found", body = crate::error::ApiErrorResponse),
        (status = 409, description = "Token already burned", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn burn_client(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<BurnRequest>,
) -> Result<Json<ClientResponse>, ApiError> {
    check_token_format(&token)?;
    tracing::info!("Burning token {}", token);

    let record = app_state
        .subscription_service
        .burn(&token, &req.reason)
        .await?;
    Ok(Json(ClientResponse::from_record(record, Utc::now())))
}

/// List burned tokens, newest first
#[utoipa::path(
    get,
    path = "/v1/burned",
    tag = "Clients",
    responses(
        (status = 200, description = "Burn events", body = BurnedTokenListResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn list_burned(
    State(app_state): State<AppState>,
) -> Result<Json<BurnedTokenListResponse>, ApiError> {
    let burned: Vec<BurnedTokenResponse> = app_state
        .subscription_service
        .list_burned()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = burned.len();

    Ok(Json(BurnedTokenListResponse { burned, total }))
}

/// Aggregate counts over all records
#[utoipa::path(
    get,
    path = "/v1/stats",
    tag = "Clients",
    responses(
        (status = 200, description = "Counts", body = StatsResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn get_stats(State(app_state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = app_state.subscription_service.stats().await?;
    Ok(Json(stats.into()))
}

/// Most recent lifecycle operations
#[utoipa::path(
    get,
    path = "/v1/operations",
    tag = "Operations",
    params(RecentOperationsParams),
    responses(
        (status = 200, description = "Operations, newest first", body = OperationListResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("admin_token" = [])
    )
)]
pub async fn recent_operations(
    State(app_state): State<AppState>,
    Query(params): Query<RecentOperationsParams>,
) -> Result<Json<OperationListResponse>, ApiError> {
    let operations = app_state
        .subscription_service
        .recent_operations(params.limit)
        .await?
        .into_iter()
        .map(OperationResponse::from)
        .collect();

    Ok(Json(OperationListResponse { operations }))
}

/// Create the admin router for client lifecycle routes
pub fn create_clients_router() -> Router<AppState> {
    Router::new()
        .route("/v1/clients", post(register_client).get(list_clients))
        .route("/v1/clients/search", get(search_clients))
        .route("/v1/clients/expiring", get(list_expiring))
        .route("/v1/clients/{token}", get(get_client))
        .route("/v1/clients/{token}/pay", post(pay_client))
        .route("/v1/clients/{token}/extend", post(extend_client))
        .route("/v1/clients/{token}/burn", post(burn_client))
        .route("/v1/burned", get(list_burned))
        .route("/v1/stats", get(get_stats))
        .route("/v1/operations", get(recent_operations))
}
