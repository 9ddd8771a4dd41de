//! Completion Routes - Provider callbacks
//!
//! The provider posts the final outcome of every call it accepted. The body
//! is verified against the signing secret when one is configured, then
//! matched to its call by correlation id.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};

use super::error_response;
use crate::application::CompletionOutcome;
use crate::auth::{verify_signature, SIGNATURE_HEADER};
use crate::models::{CompletionAck, CompletionSignalRequest};
use crate::AppState;

/// Receive a completion signal
#[utoipa::path(
    post,
    path = "/callbacks/completion",
    request_body = CompletionSignalRequest,
    params(
        ("X-Dialer-Signature" = Option<String>, Header,
            description = "sha256=<hex HMAC-SHA256 of the raw body>, required when a signing secret is configured")
    ),
    responses(
        (status = 200, description = "Signal received", body = CompletionAck),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 500, description = "Store unavailable, provider should retry")
    ),
    tag = "Callback"
)]
pub async fn receive_completion(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CompletionAck>, (StatusCode, String)> {
    if let Some(secret) = state.signing_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok());

        match signature {
            Some(signature) if verify_signature(secret, &body, signature) => {}
            Some(_) => {
                tracing::warn!("Completion signal with invalid signature");
                return Err((StatusCode::UNAUTHORIZED, "Invalid signature".to_string()));
            }
            None => {
                tracing::warn!("Completion signal without signature");
                return Err((StatusCode::UNAUTHORIZED, "Missing signature".to_string()));
            }
        }
    }

    let payload: CompletionSignalRequest = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed completion signal: {e}")))?;

    let outcome = state
        .correlator
        .on_completion_signal(&payload.into_signal())
        .await
        .map_err(error_response)?;

    match outcome {
        CompletionOutcome::AlreadyTerminal(status) => {
            tracing::debug!("Completion signal ignored, call already {}", status);
        }
        CompletionOutcome::NotInProgress(status) => {
            tracing::debug!("Completion signal ignored, call is {}", status);
        }
        CompletionOutcome::Applied(_) | CompletionOutcome::UnknownCorrelation => {}
    }

    Ok(Json(CompletionAck { received: true }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/callbacks/completion", post(receive_completion))
}
