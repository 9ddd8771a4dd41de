//! ProviderOutcome - Final call outcome vocabulary of the call provider

use serde::{Deserialize, Serialize};

use super::CallStatus;

/// Outcome reported by the provider's completion signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderOutcome {
    Completed,
    Failed,
    Busy,
    NoAnswer,
}

impl ProviderOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderOutcome::Completed => "COMPLETED",
            ProviderOutcome::Failed => "FAILED",
            ProviderOutcome::Busy => "BUSY",
            ProviderOutcome::NoAnswer => "NO_ANSWER",
        }
    }

    /// Terminal status a call moves to for this outcome
    pub fn terminal_status(&self) -> CallStatus {
        match self {
            ProviderOutcome::Completed => CallStatus::Completed,
            ProviderOutcome::Failed | ProviderOutcome::Busy | ProviderOutcome::NoAnswer => {
                CallStatus::Failed
            }
        }
    }

    /// Error text recorded for unsuccessful outcomes
    pub fn failure_message(&self) -> Option<String> {
        match self {
            ProviderOutcome::Completed => None,
            other => Some(format!("Provider reported call outcome {}", other.as_str())),
        }
    }
}

impl std::fmt::Display for ProviderOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_maps_to_completed_without_error() {
        assert_eq!(
            ProviderOutcome::Completed.terminal_status(),
            CallStatus::Completed
        );
        assert_eq!(ProviderOutcome::Completed.failure_message(), None);
    }

    #[test]
    fn test_unsuccessful_outcomes_map_to_failed_naming_outcome() {
        for (outcome, name) in [
            (ProviderOutcome::Failed, "FAILED"),
            (ProviderOutcome::Busy, "BUSY"),
            (ProviderOutcome::NoAnswer, "NO_ANSWER"),
        ] {
            assert_eq!(outcome.terminal_status(), CallStatus::Failed);
            let message = outcome.failure_message().unwrap();
            assert!(message.contains(name), "{message}");
        }
    }

    #[test]
    fn test_deserializes_provider_vocabulary() {
        let outcome: ProviderOutcome = serde_json::from_str("\"NO_ANSWER\"").unwrap();
        assert_eq!(outcome, ProviderOutcome::NoAnswer);
        assert!(serde_json::from_str::<ProviderOutcome>("\"RINGING\"").is_err());
    }
}
