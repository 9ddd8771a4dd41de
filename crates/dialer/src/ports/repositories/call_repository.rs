//! Call Repository Port
//!
//! Abstract interface for the call record store.
//!
//! Every mutation is a single statement against the store. Transitions that
//! can race (claim, retry reschedule, completion, client edits) use the
//! status-guarded variants so that a loser observes `None` instead of
//! overwriting a record another actor has already moved on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::{Call, CallPatch};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{CallStatus, StatusCounts};

/// Repository interface for Call entities
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Persist a new call
    ///
    /// Fails with `DomainError::Conflict` when another call for the same
    /// destination is PENDING or IN_PROGRESS.
    async fn insert(&self, call: &Call) -> Result<Call, DomainError>;

    /// Find a call by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError>;

    /// Find a call by the provider's correlation id
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Call>, DomainError>;

    /// Find the PENDING or IN_PROGRESS call for a destination, if any
    async fn find_active_by_destination(
        &self,
        destination: &str,
    ) -> Result<Option<Call>, DomainError>;

    /// Unconditional partial update; `None` if the id is unknown
    async fn update(&self, id: Uuid, patch: &CallPatch) -> Result<Option<Call>, DomainError>;

    /// Partial update applied only while the record is in `expected` status
    ///
    /// Returns `None` when the record is unknown or the guard did not match.
    async fn update_if_status(
        &self,
        id: Uuid,
        expected: CallStatus,
        patch: &CallPatch,
    ) -> Result<Option<Call>, DomainError>;

    /// Atomically claim the oldest claimable PENDING call
    ///
    /// Selects the oldest call with `status = PENDING` whose eligibility time
    /// has passed and moves it to IN_PROGRESS with `started_at = now`, in a
    /// single conditional write. `None` means there was nothing to claim or
    /// another worker won the race.
    async fn claim_oldest_pending(&self, now: DateTime<Utc>) -> Result<Option<Call>, DomainError>;

    /// Live count of calls in a status
    async fn count_in_status(&self, status: CallStatus) -> Result<i64, DomainError>;

    /// Counts for every status from one consistent read
    async fn count_by_status(&self) -> Result<StatusCounts, DomainError>;

    /// Page of calls, newest first, with the total for the same filter
    async fn list(
        &self,
        status: Option<CallStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Call>, i64), DomainError>;

    /// Move PENDING calls created before `cutoff` to EXPIRED
    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError>;

    /// Return IN_PROGRESS calls claimed before `started_before` that never
    /// got a provider correlation id to PENDING, immediately eligible
    async fn reclaim_unaccepted_before(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError>;
}
