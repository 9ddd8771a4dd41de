//! Retry Scheduler
//!
//! Applies the retry policy to a failed dispatch: back to PENDING with an
//! eligibility time, or terminal FAILED. Both writes are guarded on the call
//! still being IN_PROGRESS, so a completion callback or sweep that got there
//! first is never overwritten.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use dialer::{
    Call, CallPatch, CallRepository, CallStatus, DispatchFailure, DomainError, RetryDecision,
    RetryPolicy,
};

/// What the scheduler did with a failed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Rescheduled {
        attempts: i32,
        eligible_at: DateTime<Utc>,
    },
    Failed {
        attempts: i32,
    },
    /// The call was no longer IN_PROGRESS; nothing written
    Superseded,
}

pub struct RetryScheduler<R: CallRepository + ?Sized> {
    repo: Arc<R>,
    policy: RetryPolicy,
}

impl<R: CallRepository + ?Sized> RetryScheduler<R> {
    pub fn new(repo: Arc<R>, policy: RetryPolicy) -> Self {
        Self { repo, policy }
    }

    pub async fn handle_failure(
        &self,
        call: &Call,
        failure: &DispatchFailure,
    ) -> Result<RetryOutcome, DomainError> {
        self.handle_failure_at(call, failure, Utc::now()).await
    }

    pub async fn handle_failure_at(
        &self,
        call: &Call,
        failure: &DispatchFailure,
        now: DateTime<Utc>,
    ) -> Result<RetryOutcome, DomainError> {
        let (patch, outcome) = match self.policy.decide(call.attempts, failure, now) {
            RetryDecision::Reschedule {
                attempts,
                delay,
                eligible_at,
            } => {
                tracing::warn!(
                    call_id = %call.id,
                    attempts,
                    "🔁 Dispatch failed, retrying in {}s: {}",
                    delay.num_seconds(),
                    failure
                );
                (
                    CallPatch::reschedule(attempts, failure.message.clone(), eligible_at),
                    RetryOutcome::Rescheduled {
                        attempts,
                        eligible_at,
                    },
                )
            }
            RetryDecision::GiveUp { attempts } => {
                tracing::warn!(
                    call_id = %call.id,
                    attempts,
                    retryable = failure.is_retryable(),
                    "🛑 Dispatch failed permanently: {}",
                    failure
                );
                (
                    CallPatch::failed(attempts, failure.message.clone(), now),
                    RetryOutcome::Failed { attempts },
                )
            }
        };

        let applied = self
            .repo
            .update_if_status(call.id, CallStatus::InProgress, &patch)
            .await?;

        if applied.is_none() {
            tracing::info!(
                call_id = %call.id,
                "Call left IN_PROGRESS before its failure was recorded, skipping"
            );
            return Ok(RetryOutcome::Superseded);
        }

        Ok(outcome)
    }
}
