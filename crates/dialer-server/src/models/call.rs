//! Call - Outbound call request DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use dialer::{Call, Page};

// ============================================
// Request/Response DTOs
// ============================================

/// Create Call request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    /// E.164 phone number, e.g. `+14155550123`
    #[schema(example = "+14155550123")]
    pub destination: String,
    #[schema(example = "welcome-v2")]
    pub script_id: String,
    /// Free-form JSON object carried with the call
    pub metadata: Option<serde_json::Value>,
}

/// Update Call request
///
/// Only calls still PENDING can be edited. The destination is fixed.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCallRequest {
    pub script_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Call list query
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCallsQuery {
    /// PENDING, IN_PROGRESS, COMPLETED, FAILED or EXPIRED
    pub status: Option<String>,
    /// 1-based page number (default 1)
    pub page: Option<i64>,
    /// Page size, 1..=100 (default 20)
    pub limit: Option<i64>,
}

/// Call response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub id: Uuid,
    pub destination: String,
    pub script_id: String,
    pub metadata: serde_json::Value,
    #[schema(example = "PENDING")]
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    /// Provider correlation id, set once the provider accepted the call
    pub external_correlation_id: Option<String>,
    /// Earliest time a rescheduled call is dialed again
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CallResponse {
    pub fn from_domain(call: Call) -> Self {
        Self {
            id: call.id,
            destination: call.destination,
            script_id: call.script_id,
            metadata: call.metadata,
            status: call.status.as_str().to_string(),
            attempts: call.attempts,
            last_error: call.last_error,
            external_correlation_id: call.external_call_id,
            next_attempt_at: call.next_attempt_at,
            duration_sec: call.duration_sec,
            created_at: call.created_at,
            started_at: call.started_at,
            ended_at: call.ended_at,
            updated_at: call.updated_at,
        }
    }
}

/// Paged call list response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallListResponse {
    pub items: Vec<CallResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl CallListResponse {
    pub fn from_domain(page: Page<Call>) -> Self {
        let page = page.map(CallResponse::from_domain);
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        }
    }
}
