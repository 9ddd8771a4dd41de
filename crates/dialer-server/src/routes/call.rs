//! Call Routes - Outbound call queue
//!
//! HTTP handlers that delegate to CallService for business logic.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use dialer::CallStatus;

use super::error_response;
use crate::models::{
    CallListResponse, CallResponse, CreateCallRequest, ListCallsQuery, UpdateCallRequest,
};
use crate::AppState;

fn bad_body(rejection: JsonRejection) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, rejection.body_text())
}

/// Queue a new call
#[utoipa::path(
    post,
    path = "/calls",
    request_body = CreateCallRequest,
    responses(
        (status = 201, description = "Call queued", body = CallResponse),
        (status = 400, description = "Invalid destination, script or metadata"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 409, description = "Destination already has an active call"),
        (status = 500, description = "Internal server error")
    ),
    security(("api_key" = [])),
    tag = "Call"
)]
pub async fn create_call(
    State(state): State<AppState>,
    payload: Result<Json<CreateCallRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CallResponse>), (StatusCode, String)> {
    let Json(payload) = payload.map_err(bad_body)?;

    let call = state
        .call_service
        .create(payload.destination, payload.script_id, payload.metadata)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(CallResponse::from_domain(call))))
}

/// List calls, newest first
#[utoipa::path(
    get,
    path = "/calls",
    params(ListCallsQuery),
    responses(
        (status = 200, description = "Page of calls", body = CallListResponse),
        (status = 400, description = "Unknown status or page < 1"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Internal server error")
    ),
    security(("api_key" = [])),
    tag = "Call"
)]
pub async fn list_calls(
    State(state): State<AppState>,
    Query(query): Query<ListCallsQuery>,
) -> Result<Json<CallListResponse>, (StatusCode, String)> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<CallStatus>)
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let page = state
        .call_service
        .list(status, query.page, query.limit)
        .await
        .map_err(error_response)?;

    Ok(Json(CallListResponse::from_domain(page)))
}

/// Get Call by ID
#[utoipa::path(
    get,
    path = "/calls/{id}",
    params(
        ("id" = Uuid, Path, description = "Call ID")
    ),
    responses(
        (status = 200, description = "Call found", body = CallResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Call not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("api_key" = [])),
    tag = "Call"
)]
pub async fn get_call(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CallResponse>, (StatusCode, String)> {
    let call = state.call_service.get(id).await.map_err(error_response)?;

    Ok(Json(CallResponse::from_domain(call)))
}

/// Edit a call that has not been dialed yet
#[utoipa::path(
    patch,
    path = "/calls/{id}",
    params(
        ("id" = Uuid, Path, description = "Call ID")
    ),
    request_body = UpdateCallRequest,
    responses(
        (status = 200, description = "Call updated", body = CallResponse),
        (status = 400, description = "Invalid or unknown fields"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Call not found"),
        (status = 409, description = "Call is no longer PENDING"),
        (status = 500, description = "Internal server error")
    ),
    security(("api_key" = [])),
    tag = "Call"
)]
pub async fn update_call(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateCallRequest>, JsonRejection>,
) -> Result<Json<CallResponse>, (StatusCode, String)> {
    let Json(payload) = payload.map_err(bad_body)?;

    let call = state
        .call_service
        .update(id, payload.script_id, payload.metadata)
        .await
        .map_err(error_response)?;

    Ok(Json(CallResponse::from_domain(call)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calls", get(list_calls).post(create_call))
        .route("/calls/:id", get(get_call).patch(update_call))
}
