//! Dialer API Routes
//!
//! - /calls - Call queueing, listing and editing
//! - /metrics - Per-status call counts
//! - /callbacks/completion - Provider completion signals

pub mod call;
pub mod completion;
pub mod metrics;
pub mod swagger;

use axum::http::StatusCode;
use dialer::DomainError;

/// Map a domain error to an HTTP status and message
pub(crate) fn error_response(e: DomainError) -> (StatusCode, String) {
    let status = match &e {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) | DomainError::InvalidState { .. } => StatusCode::CONFLICT,
        DomainError::Repository(_) | DomainError::ExternalService(_) => {
            tracing::error!("Request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}
