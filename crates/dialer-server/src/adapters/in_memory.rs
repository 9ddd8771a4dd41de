//! In-memory adapters for tests
//!
//! `InMemoryCallRepository` keeps the store contract of the Postgres
//! adapter: every operation runs under one lock, so a claim or guarded
//! update is as atomic as its single-statement SQL counterpart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use dialer::{
    Call, CallInitiator, CallPatch, CallRepository, CallStatus, DispatchFailure, DomainError,
    InitiateCallRequest, InitiatedCall, StatusCounts, ABANDONED_DISPATCH,
};

#[derive(Default)]
pub struct InMemoryCallRepository {
    calls: Mutex<Vec<Call>>,
    unavailable: AtomicBool,
    failures_left: AtomicUsize,
}

impl InMemoryCallRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store being unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` operations, then recover
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Insert a record as-is, bypassing the uniqueness check
    pub fn seed(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn get(&self, id: Uuid) -> Option<Call> {
        self.calls.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }

    pub fn all(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        let one_off = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if one_off || self.unavailable.load(Ordering::SeqCst) {
            Err(DomainError::Repository("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn patch_where(
        &self,
        id: Uuid,
        expected: Option<CallStatus>,
        patch: &CallPatch,
    ) -> Result<Option<Call>, DomainError> {
        self.check_available()?;
        let mut calls = self.calls.lock().unwrap();

        let Some(call) = calls.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if call.status.is_terminal() || expected.is_some_and(|s| s != call.status) {
            return Ok(None);
        }

        patch.apply_to(call, Utc::now());
        Ok(Some(call.clone()))
    }
}

#[async_trait]
impl CallRepository for InMemoryCallRepository {
    async fn insert(&self, call: &Call) -> Result<Call, DomainError> {
        self.check_available()?;
        let mut calls = self.calls.lock().unwrap();

        if calls
            .iter()
            .any(|c| c.destination == call.destination && c.status.is_active())
        {
            return Err(DomainError::Conflict(format!(
                "destination {} already has an active call",
                call.destination
            )));
        }

        calls.push(call.clone());
        Ok(call.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError> {
        self.check_available()?;
        Ok(self.get(id))
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Call>, DomainError> {
        self.check_available()?;
        let calls = self.calls.lock().unwrap();
        Ok(calls
            .iter()
            .find(|c| c.external_call_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_active_by_destination(
        &self,
        destination: &str,
    ) -> Result<Option<Call>, DomainError> {
        self.check_available()?;
        let calls = self.calls.lock().unwrap();
        Ok(calls
            .iter()
            .find(|c| c.destination == destination && c.status.is_active())
            .cloned())
    }

    async fn update(&self, id: Uuid, patch: &CallPatch) -> Result<Option<Call>, DomainError> {
        self.patch_where(id, None, patch)
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: CallStatus,
        patch: &CallPatch,
    ) -> Result<Option<Call>, DomainError> {
        self.patch_where(id, Some(expected), patch)
    }

    async fn claim_oldest_pending(&self, now: DateTime<Utc>) -> Result<Option<Call>, DomainError> {
        self.check_available()?;
        let mut calls = self.calls.lock().unwrap();

        let oldest = calls
            .iter_mut()
            .filter(|c| c.is_claimable(now))
            .min_by_key(|c| c.created_at);

        Ok(oldest.map(|call| {
            call.status = CallStatus::InProgress;
            call.started_at = Some(now);
            call.updated_at = now;
            call.clone()
        }))
    }

    async fn count_in_status(&self, status: CallStatus) -> Result<i64, DomainError> {
        self.check_available()?;
        let calls = self.calls.lock().unwrap();
        Ok(calls.iter().filter(|c| c.status == status).count() as i64)
    }

    async fn count_by_status(&self) -> Result<StatusCounts, DomainError> {
        self.check_available()?;
        let calls = self.calls.lock().unwrap();
        let mut counts = StatusCounts::default();
        for call in calls.iter() {
            counts.add(call.status, 1);
        }
        Ok(counts)
    }

    async fn list(
        &self,
        status: Option<CallStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Call>, i64), DomainError> {
        self.check_available()?;
        let calls = self.calls.lock().unwrap();

        let mut matching: Vec<Call> = calls
            .iter()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }

    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        self.check_available()?;
        let mut calls = self.calls.lock().unwrap();

        let mut expired = 0;
        for call in calls
            .iter_mut()
            .filter(|c| c.status == CallStatus::Pending && c.created_at < cutoff)
        {
            call.status = CallStatus::Expired;
            call.ended_at = Some(now);
            call.updated_at = now;
            expired += 1;
        }
        Ok(expired)
    }

    async fn reclaim_unaccepted_before(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        self.check_available()?;
        let mut calls = self.calls.lock().unwrap();

        let mut reclaimed = 0;
        for call in calls.iter_mut().filter(|c| {
            c.status == CallStatus::InProgress
                && c.external_call_id.is_none()
                && c.started_at.is_some_and(|t| t < started_before)
        }) {
            call.status = CallStatus::Pending;
            call.started_at = None;
            call.next_attempt_at = None;
            call.last_error = Some(ABANDONED_DISPATCH.to_string());
            call.updated_at = now;
            reclaimed += 1;
        }
        Ok(reclaimed)
    }
}

/// Provider double answering from a script of canned results
///
/// Once the script runs out every call is accepted with `ext-<n>`.
#[derive(Default)]
pub struct ScriptedInitiator {
    script: Mutex<VecDeque<Result<InitiatedCall, DispatchFailure>>>,
    requests: Mutex<Vec<InitiateCallRequest>>,
    counter: AtomicUsize,
    delay: Option<Duration>,
    panics: bool,
}

impl ScriptedInitiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(results: Vec<Result<InitiatedCall, DispatchFailure>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Default::default()
        }
    }

    /// Every initiation takes `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every initiation panics after recording the request
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Default::default()
        }
    }

    pub fn push(&self, result: Result<InitiatedCall, DispatchFailure>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn requests(&self) -> Vec<InitiateCallRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn accepted(external_id: &str) -> Result<InitiatedCall, DispatchFailure> {
        Ok(InitiatedCall {
            external_correlation_id: external_id.to_string(),
            status: "queued".to_string(),
        })
    }
}

#[async_trait]
impl CallInitiator for ScriptedInitiator {
    async fn initiate(
        &self,
        request: &InitiateCallRequest,
    ) -> Result<InitiatedCall, DispatchFailure> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("provider client blew up");
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Self::accepted(&format!("ext-{n}"))
        })
    }
}
