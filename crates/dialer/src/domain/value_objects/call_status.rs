//! CallStatus - Lifecycle state of a call record

use serde::{Deserialize, Serialize};

/// Call lifecycle status
///
/// ```text
/// PENDING --claim--> IN_PROGRESS --callback--> COMPLETED | FAILED
///    ^                    |
///    +--retryable failure-+--exhausted / non-retryable--> FAILED
/// PENDING --sweep--> EXPIRED
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Expired,
}

impl CallStatus {
    pub const ALL: [CallStatus; 5] = [
        CallStatus::Pending,
        CallStatus::InProgress,
        CallStatus::Completed,
        CallStatus::Failed,
        CallStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Pending => "PENDING",
            CallStatus::InProgress => "IN_PROGRESS",
            CallStatus::Completed => "COMPLETED",
            CallStatus::Failed => "FAILED",
            CallStatus::Expired => "EXPIRED",
        }
    }

    /// No field of a record may change once it reaches a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Failed | CallStatus::Expired
        )
    }

    /// Statuses that count against the per-destination uniqueness rule
    pub fn is_active(&self) -> bool {
        matches!(self, CallStatus::Pending | CallStatus::InProgress)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(CallStatus::Pending),
            "IN_PROGRESS" => Ok(CallStatus::InProgress),
            "COMPLETED" => Ok(CallStatus::Completed),
            "FAILED" => Ok(CallStatus::Failed),
            "EXPIRED" => Ok(CallStatus::Expired),
            _ => Err(format!("Unknown call status: {}", s)),
        }
    }
}
