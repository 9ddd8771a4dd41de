//! StatusCounts - Number of call records per status

use serde::{Deserialize, Serialize};

use super::CallStatus;

/// Per-status record counts taken from one consistent read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
    pub expired: i64,
}

impl StatusCounts {
    pub fn get(&self, status: CallStatus) -> i64 {
        match status {
            CallStatus::Pending => self.pending,
            CallStatus::InProgress => self.in_progress,
            CallStatus::Completed => self.completed,
            CallStatus::Failed => self.failed,
            CallStatus::Expired => self.expired,
        }
    }

    pub fn add(&mut self, status: CallStatus, count: i64) {
        match status {
            CallStatus::Pending => self.pending += count,
            CallStatus::InProgress => self.in_progress += count,
            CallStatus::Completed => self.completed += count,
            CallStatus::Failed => self.failed += count,
            CallStatus::Expired => self.expired += count,
        }
    }

    pub fn total(&self) -> i64 {
        CallStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }
}
