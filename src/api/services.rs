use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::{
    error::ApiError,
    models::{HealthResponse, SitesResponse},
    state::AppState,
};
use crate::dispatcher::ConnectionState;

/// Health check endpoint (GET /health)
///
/// 200 while the dispatcher is consuming, 503 in every other connection
/// state so load balancers stop routing to a draining instance.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let connection = state.connection_state();
    let ready = connection == ConnectionState::Ready;

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if ready { "healthy" } else { "unavailable" },
        connection,
        handlers: state.registry.len(),
        version: env!("CARGO_PKG_VERSION"),
    };

    (status_code, Json(response))
}

/// Registered sites with their actions (GET /operators/sites)
pub async fn list_sites(State(state): State<AppState>) -> impl IntoResponse {
    Json(SitesResponse {
        sites: state.registry.describe_all(),
    })
}

/// One site (GET /operators/sites/{site_id})
pub async fn get_site(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .registry
        .describe(&site_id)?
        .ok_or_else(|| ApiError::NotFound(format!("site {site_id}")))?;

    Ok(Json(info))
}

/// Counter snapshot (GET /operators/metrics)
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
