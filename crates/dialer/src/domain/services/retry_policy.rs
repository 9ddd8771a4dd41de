//! Retry Policy - Exponential backoff for failed dispatches
//!
//! Attempt `n` (1-based count of failures so far) becomes eligible again
//! after `2^n` seconds: 2s, 4s, 8s, ...

use chrono::{DateTime, Duration, Utc};

use super::DispatchFailure;

pub const DEFAULT_MAX_RETRY_ATTEMPTS: i32 = 3;
/// Upper bound on a single backoff delay (1 hour)
pub const MAX_BACKOFF_SECS: i64 = 3600;

/// What to do with a call after a failed dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return the call to PENDING, claimable from `eligible_at`
    Reschedule {
        attempts: i32,
        delay: Duration,
        eligible_at: DateTime<Utc>,
    },
    /// Finalize the call as FAILED
    GiveUp { attempts: i32 },
}

/// Retry vs. permanent failure rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: i32) -> Self {
        Self { max_attempts }
    }

    /// Backoff delay for the given failure count
    pub fn backoff(attempts: i32) -> Duration {
        let exponent = attempts.clamp(0, 30) as u32;
        let secs = 2i64.pow(exponent).min(MAX_BACKOFF_SECS);
        Duration::seconds(secs)
    }

    /// Decide the next step for a call that had `previous_attempts` failures
    /// before this one
    pub fn decide(
        &self,
        previous_attempts: i32,
        failure: &DispatchFailure,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        let attempts = previous_attempts.saturating_add(1);

        if failure.is_retryable() && attempts < self.max_attempts {
            let delay = Self::backoff(attempts);
            RetryDecision::Reschedule {
                attempts,
                delay,
                eligible_at: now + delay,
            }
        } else {
            RetryDecision::GiveUp { attempts }
        }
    }
}
