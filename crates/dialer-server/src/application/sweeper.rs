//! Expiry Sweeper
//!
//! Periodic housekeeping over the call store:
//! - PENDING calls older than the TTL move to EXPIRED so stale requests are
//!   never dialed.
//! - IN_PROGRESS calls that never got a provider correlation id within the
//!   dispatch lease go back to PENDING. Their per-call task was lost (process
//!   stopped mid-dispatch) and they would otherwise hold a gate slot forever.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;

use dialer::{CallRepository, DomainError};

pub struct ExpirySweeper<R: CallRepository + ?Sized> {
    repo: Arc<R>,
    /// `None` disables expiry
    ttl: Option<chrono::Duration>,
    dispatch_lease: chrono::Duration,
    interval: Duration,
}

impl<R: CallRepository + ?Sized + 'static> ExpirySweeper<R> {
    pub fn new(
        repo: Arc<R>,
        ttl: Option<chrono::Duration>,
        dispatch_lease: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            repo,
            ttl,
            dispatch_lease,
            interval,
        }
    }

    /// Expire every PENDING call created before `now - ttl`
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let Some(cutoff) = self.ttl.and_then(|ttl| now.checked_sub_signed(ttl)) else {
            return Ok(0);
        };

        let expired = self.repo.expire_pending_before(cutoff, now).await?;
        if expired > 0 {
            tracing::info!("⌛ Expired {} stale pending call(s)", expired);
        }
        Ok(expired)
    }

    /// Return calls claimed before `now - dispatch_lease` and never accepted
    pub async fn reclaim_once(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let Some(started_before) = now.checked_sub_signed(self.dispatch_lease) else {
            return Ok(0);
        };

        let reclaimed = self
            .repo
            .reclaim_unaccepted_before(started_before, now)
            .await?;
        if reclaimed > 0 {
            tracing::warn!("♻️  Returned {} abandoned dispatch(es) to PENDING", reclaimed);
        }
        Ok(reclaimed)
    }

    /// Start the sweeper (runs in background until `shutdown` flips to true)
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        match self.ttl {
            Some(ttl) => tracing::info!(
                "🧹 Expiry sweeper started (ttl: {}s, lease: {}s, interval: {:?})",
                ttl.num_seconds(),
                self.dispatch_lease.num_seconds(),
                self.interval
            ),
            None => tracing::info!(
                "🧹 Expiry sweeper started, expiry disabled (lease: {}s, interval: {:?})",
                self.dispatch_lease.num_seconds(),
                self.interval
            ),
        }

        let mut ticker = interval(self.interval);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let now = Utc::now();
            if let Err(e) = self.sweep_once(now).await {
                tracing::warn!("⚠️  Expiry sweep failed: {}", e);
            }
            if let Err(e) = self.reclaim_once(now).await {
                tracing::warn!("⚠️  Dispatch reclaim failed: {}", e);
            }
        }

        tracing::info!("🧹 Expiry sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryCallRepository;
    use dialer::{Call, CallPatch, CallStatus, ABANDONED_DISPATCH};

    const LEASE_MINUTES: i64 = 10;

    fn sweeper(
        repo: Arc<InMemoryCallRepository>,
        ttl: Option<chrono::Duration>,
    ) -> ExpirySweeper<InMemoryCallRepository> {
        ExpirySweeper::new(
            repo,
            ttl,
            chrono::Duration::minutes(LEASE_MINUTES),
            Duration::from_secs(300),
        )
    }

    fn call_aged(repo: &InMemoryCallRepository, destination: &str, age: chrono::Duration) -> uuid::Uuid {
        let mut call = Call::new(destination.into(), "welcome".into(), None);
        call.created_at = Utc::now() - age;
        let id = call.id;
        repo.seed(call);
        id
    }

    fn in_progress_since(
        repo: &InMemoryCallRepository,
        destination: &str,
        age: chrono::Duration,
    ) -> uuid::Uuid {
        let mut call = Call::new(destination.into(), "welcome".into(), None);
        call.status = CallStatus::InProgress;
        call.started_at = Some(Utc::now() - age);
        let id = call.id;
        repo.seed(call);
        id
    }

    #[tokio::test]
    async fn test_expires_only_stale_pending_calls() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let sweeper = sweeper(repo.clone(), Some(chrono::Duration::hours(24)));

        let stale = call_aged(&repo, "+14155550001", chrono::Duration::hours(25));
        let fresh = call_aged(&repo, "+14155550002", chrono::Duration::hours(1));
        let stale_in_flight = call_aged(&repo, "+14155550003", chrono::Duration::hours(30));
        repo.claim_oldest_pending(Utc::now()).await.unwrap();

        let expired = sweeper.sweep_once(Utc::now()).await.unwrap();

        assert_eq!(expired, 1);
        let stale = repo.get(stale).unwrap();
        assert_eq!(stale.status, CallStatus::Expired);
        assert!(stale.ended_at.is_some());
        assert_eq!(repo.get(fresh).unwrap().status, CallStatus::Pending);
        assert_eq!(
            repo.get(stale_in_flight).unwrap().status,
            CallStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_expiry_disabled_without_ttl() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let sweeper = sweeper(repo.clone(), None);
        let id = call_aged(&repo, "+14155550001", chrono::Duration::days(300));

        assert_eq!(sweeper.sweep_once(Utc::now()).await.unwrap(), 0);
        assert_eq!(repo.get(id).unwrap().status, CallStatus::Pending);
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let sweeper = sweeper(repo.clone(), Some(chrono::Duration::MAX));
        call_aged(&repo, "+14155550001", chrono::Duration::days(300));

        assert_eq!(sweeper.sweep_once(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reclaims_only_unaccepted_dispatches_past_lease() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let sweeper = sweeper(repo.clone(), None);

        let lease_passed = chrono::Duration::minutes(LEASE_MINUTES + 1);
        let abandoned = in_progress_since(&repo, "+14155550001", lease_passed);
        let recent = in_progress_since(&repo, "+14155550002", chrono::Duration::minutes(1));
        let accepted = in_progress_since(&repo, "+14155550003", chrono::Duration::hours(2));
        repo.update(accepted, &CallPatch::accepted("ext-1".into()))
            .await
            .unwrap();

        let reclaimed = sweeper.reclaim_once(Utc::now()).await.unwrap();

        assert_eq!(reclaimed, 1);
        let abandoned = repo.get(abandoned).unwrap();
        assert_eq!(abandoned.status, CallStatus::Pending);
        assert_eq!(abandoned.attempts, 0);
        assert!(abandoned.started_at.is_none());
        assert_eq!(abandoned.last_error.as_deref(), Some(ABANDONED_DISPATCH));
        assert!(abandoned.is_claimable(Utc::now()));
        assert_eq!(repo.get(recent).unwrap().status, CallStatus::InProgress);
        assert_eq!(repo.get(accepted).unwrap().status, CallStatus::InProgress);
    }

    #[tokio::test]
    async fn test_runs_periodically_and_stops_on_shutdown() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let sweeper = ExpirySweeper::new(
            repo.clone(),
            Some(chrono::Duration::seconds(60)),
            chrono::Duration::seconds(60),
            Duration::from_millis(20),
        );
        let expiring = call_aged(&repo, "+14155550001", chrono::Duration::minutes(5));
        let abandoned = in_progress_since(&repo, "+14155550002", chrono::Duration::minutes(5));

        let (tx, rx) = watch::channel(false);
        let handle = sweeper.start(rx);

        tokio::time::timeout(Duration::from_secs(2), async {
            while repo.get(expiring).unwrap().status != CallStatus::Expired
                || repo.get(abandoned).unwrap().status != CallStatus::Pending
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
