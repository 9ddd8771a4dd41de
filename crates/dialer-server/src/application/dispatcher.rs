//! Call Dispatcher
//!
//! Processes one claimed call: asks the provider to place it and records the
//! result. Acceptance stores the provider's correlation id and leaves the
//! call IN_PROGRESS until the completion callback arrives; any failure is
//! handed to the retry scheduler.

use std::sync::Arc;

use dialer::{
    Call, CallInitiator, CallPatch, CallRepository, CallStatus, DispatchFailure, DomainError,
    InitiateCallRequest,
};

use super::retry_scheduler::{RetryOutcome, RetryScheduler};

/// Result of processing one claimed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted { external_call_id: String },
    Retry(RetryOutcome),
}

pub struct CallDispatcher<R, I>
where
    R: CallRepository + ?Sized,
    I: CallInitiator + ?Sized,
{
    repo: Arc<R>,
    initiator: Arc<I>,
    scheduler: RetryScheduler<R>,
    callback_url: String,
}

impl<R, I> CallDispatcher<R, I>
where
    R: CallRepository + ?Sized,
    I: CallInitiator + ?Sized,
{
    pub fn new(
        repo: Arc<R>,
        initiator: Arc<I>,
        scheduler: RetryScheduler<R>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            initiator,
            scheduler,
            callback_url: callback_url.into(),
        }
    }

    /// Dispatch a call that was just claimed
    ///
    /// Errors are infrastructure errors only (the store could not be
    /// written); provider failures come back as `DispatchOutcome::Retry`.
    pub async fn process(&self, call: &Call) -> Result<DispatchOutcome, DomainError> {
        let request = InitiateCallRequest {
            destination: call.destination.clone(),
            script_id: call.script_id.clone(),
            completion_callback_url: self.callback_url.clone(),
        };

        tracing::info!(
            call_id = %call.id,
            attempt = call.attempts + 1,
            "📞 Initiating call to {}",
            call.destination
        );

        match self.initiator.initiate(&request).await {
            Ok(initiated) => {
                let external_call_id = initiated.external_correlation_id;
                let stored = self
                    .repo
                    .update_if_status(
                        call.id,
                        CallStatus::InProgress,
                        &CallPatch::accepted(external_call_id.clone()),
                    )
                    .await?;

                if stored.is_none() {
                    tracing::warn!(
                        call_id = %call.id,
                        external_call_id = %external_call_id,
                        "Call left IN_PROGRESS before acceptance was recorded"
                    );
                } else {
                    tracing::info!(
                        call_id = %call.id,
                        external_call_id = %external_call_id,
                        "✅ Provider accepted call ({})",
                        initiated.status
                    );
                }

                Ok(DispatchOutcome::Accepted { external_call_id })
            }
            Err(failure) => {
                let outcome = self.scheduler.handle_failure(call, &failure).await?;
                Ok(DispatchOutcome::Retry(outcome))
            }
        }
    }

    /// Process a call as an isolated unit of work
    ///
    /// An infrastructure error is recorded against the call as a retryable
    /// failure so the record does not stay IN_PROGRESS forever. Nothing is
    /// returned; the caller never sees a per-call error.
    pub async fn process_detached(&self, call: Call) {
        let Err(e) = self.process(&call).await else {
            return;
        };

        tracing::error!(call_id = %call.id, "❌ Call processing failed: {}", e);
        self.record_processing_failure(&call, format!("Processing error: {e}"))
            .await;
    }

    /// Hand a call whose processing broke down to the retry scheduler
    pub async fn record_processing_failure(&self, call: &Call, reason: String) {
        let failure = DispatchFailure::retryable(reason);
        if let Err(e) = self.scheduler.handle_failure(call, &failure).await {
            tracing::error!(
                call_id = %call.id,
                "❌ Could not record processing failure: {}",
                e
            );
        }
    }
}
