//! Metrics - Call counts per status

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use dialer::StatusCounts;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
    pub expired: i64,
    /// Sum of the per-status counts
    pub total: i64,
}

impl MetricsResponse {
    pub fn from_domain(counts: StatusCounts) -> Self {
        Self {
            pending: counts.pending,
            in_progress: counts.in_progress,
            completed: counts.completed,
            failed: counts.failed,
            expired: counts.expired,
            total: counts.total(),
        }
    }
}
