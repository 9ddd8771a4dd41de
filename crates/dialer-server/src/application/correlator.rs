//! Completion Correlator
//!
//! Matches an asynchronous completion signal from the provider to its call
//! record by correlation id and moves the call to its terminal status.
//! Duplicate and late signals are no-ops: only an IN_PROGRESS call is
//! finalized, and that transition is a single guarded write.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use dialer::{Call, CallPatch, CallRepository, CallStatus, DomainError, ProviderOutcome};

/// Final outcome reported by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSignal {
    pub external_call_id: String,
    pub outcome: ProviderOutcome,
    pub completed_at: DateTime<Utc>,
    pub duration_sec: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Applied(Call),
    /// No call carries this correlation id
    UnknownCorrelation,
    /// The call was already finalized; nothing written
    AlreadyTerminal(CallStatus),
    /// The call is live but not IN_PROGRESS (back in the queue); nothing written
    NotInProgress(CallStatus),
}

pub struct CompletionCorrelator<R: CallRepository + ?Sized> {
    repo: Arc<R>,
}

impl<R: CallRepository + ?Sized> CompletionCorrelator<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn on_completion_signal(
        &self,
        signal: &CompletionSignal,
    ) -> Result<CompletionOutcome, DomainError> {
        let Some(call) = self
            .repo
            .find_by_external_id(&signal.external_call_id)
            .await?
        else {
            tracing::debug!(
                external_call_id = %signal.external_call_id,
                "Completion signal for unknown call, discarding"
            );
            return Ok(CompletionOutcome::UnknownCorrelation);
        };

        if call.status != CallStatus::InProgress {
            return Ok(not_applied(&call));
        }

        let patch = CallPatch::finished(
            signal.outcome.terminal_status(),
            signal.outcome.failure_message(),
            signal.completed_at,
            signal.duration_sec,
        );

        match self
            .repo
            .update_if_status(call.id, CallStatus::InProgress, &patch)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    call_id = %updated.id,
                    "🏁 Call finished: {} -> {}",
                    signal.outcome.as_str(),
                    updated.status
                );
                Ok(CompletionOutcome::Applied(updated))
            }
            None => {
                // Lost a race against another writer; report where it ended up
                let current = self.repo.find_by_id(call.id).await?;
                Ok(match current {
                    Some(current) => not_applied(&current),
                    None => CompletionOutcome::UnknownCorrelation,
                })
            }
        }
    }
}

/// Outcome for a signal whose call is not IN_PROGRESS
fn not_applied(call: &Call) -> CompletionOutcome {
    if call.status.is_terminal() {
        tracing::info!(
            call_id = %call.id,
            "Duplicate completion signal, call already {}",
            call.status
        );
        CompletionOutcome::AlreadyTerminal(call.status)
    } else {
        tracing::warn!(
            call_id = %call.id,
            "Completion signal for call in {}, ignoring",
            call.status
        );
        CompletionOutcome::NotInProgress(call.status)
    }
}
