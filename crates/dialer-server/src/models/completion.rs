//! Completion - Provider callback payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use dialer::ProviderOutcome;

use crate::application::CompletionSignal;

/// Completion signal posted by the call provider
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSignalRequest {
    pub external_correlation_id: String,
    /// COMPLETED, FAILED, BUSY or NO_ANSWER
    #[schema(value_type = String, example = "COMPLETED")]
    pub outcome_status: ProviderOutcome,
    pub completed_at: DateTime<Utc>,
    pub duration_sec: Option<i32>,
}

impl CompletionSignalRequest {
    pub fn into_signal(self) -> CompletionSignal {
        CompletionSignal {
            external_call_id: self.external_correlation_id,
            outcome: self.outcome_status,
            completed_at: self.completed_at,
            duration_sec: self.duration_sec,
        }
    }
}

/// Acknowledgement; sent whether or not a call matched
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletionAck {
    pub received: bool,
}
