//! Metrics Routes

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use super::error_response;
use crate::models::MetricsResponse;
use crate::AppState;

/// Call counts per status
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Counts per status", body = MetricsResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Internal server error")
    ),
    security(("api_key" = [])),
    tag = "Metrics"
)]
pub async fn get_metrics(
    State(state): State<AppState>,
) -> Result<Json<MetricsResponse>, (StatusCode, String)> {
    let counts = state
        .call_service
        .metrics()
        .await
        .map_err(error_response)?;

    Ok(Json(MetricsResponse::from_domain(counts)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(get_metrics))
}
