//! Concurrency Gate
//!
//! Admission check against the global in-flight cap. The in-flight number
//! is always read from the store, so every dispatcher instance sees the same
//! value and a call leaving IN_PROGRESS frees capacity without any release
//! step. The check and the following claim are not atomic together: under
//! contention the cap can be overshot briefly, while each claim stays
//! exclusive.

use std::sync::Arc;

use dialer::{CallRepository, CallStatus, DomainError};

pub struct ConcurrencyGate<R: CallRepository + ?Sized> {
    repo: Arc<R>,
    max_concurrent: i64,
}

impl<R: CallRepository + ?Sized> ConcurrencyGate<R> {
    pub fn new(repo: Arc<R>, max_concurrent: i64) -> Self {
        Self {
            repo,
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> i64 {
        self.max_concurrent
    }

    /// True when one more call may be put in flight
    pub async fn admitted(&self) -> Result<bool, DomainError> {
        let in_flight = self.repo.count_in_status(CallStatus::InProgress).await?;
        Ok(in_flight < self.max_concurrent)
    }
}
