//! Dispatch Failure Classification
//!
//! Decides whether a failed call-initiation attempt may be retried.

use serde::{Deserialize, Serialize};

/// Whether a dispatch failure is worth another attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection failure, timeout, HTTP 5xx or 429
    Retryable,
    /// Any other rejection by the provider
    NonRetryable,
}

/// A failed attempt to hand a call to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub kind: FailureKind,
    pub message: String,
    /// HTTP status returned by the provider, if it answered at all
    pub status_code: Option<u16>,
}

impl DispatchFailure {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Retryable,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NonRetryable,
            message: message.into(),
            status_code: None,
        }
    }

    /// Classify a provider response that was not an acceptance
    pub fn from_status(status_code: u16, body: &str) -> Self {
        let kind = if status_code == 429 || (500..600).contains(&status_code) {
            FailureKind::Retryable
        } else {
            FailureKind::NonRetryable
        };

        let body = body.trim();
        let message = if body.is_empty() {
            format!("Provider responded with HTTP {status_code}")
        } else {
            format!(
                "Provider responded with HTTP {status_code}: {}",
                truncate(body, 500)
            )
        };

        Self {
            kind,
            message,
            status_code: Some(status_code),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Retryable
    }
}

impl std::fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_and_throttling_are_retryable() {
        for code in [429, 500, 502, 503, 504, 599] {
            assert!(DispatchFailure::from_status(code, "").is_retryable(), "{code}");
        }
    }

    #[test]
    fn test_other_client_errors_are_not_retryable() {
        for code in [400, 401, 403, 404, 409, 422, 499] {
            assert!(!DispatchFailure::from_status(code, "").is_retryable(), "{code}");
        }
    }

    #[test]
    fn test_unexpected_statuses_are_not_retryable() {
        for code in [200, 201, 204, 302] {
            assert!(!DispatchFailure::from_status(code, "").is_retryable(), "{code}");
        }
    }

    #[test]
    fn test_message_includes_status_and_truncated_body() {
        let failure = DispatchFailure::from_status(503, &"x".repeat(600));
        assert!(failure.message.starts_with("Provider responded with HTTP 503: "));
        assert!(failure.message.ends_with("..."));
        assert_eq!(failure.status_code, Some(503));

        let failure = DispatchFailure::from_status(404, "  ");
        assert_eq!(failure.message, "Provider responded with HTTP 404");
    }
}
