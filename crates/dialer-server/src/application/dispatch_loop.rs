//! Dispatch Loop - Continuous claim-and-dispatch scheduler
//!
//! Each tick checks the concurrency gate, claims the oldest eligible call
//! and hands it to a detached task. The loop never waits on a provider
//! request, and a store error only delays the next tick.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::sleep;

use dialer::{Call, CallInitiator, CallRepository, DomainError};

use super::dispatcher::CallDispatcher;
use super::gate::ConcurrencyGate;

/// Dispatch loop configuration
#[derive(Debug, Clone)]
pub struct DispatchLoopConfig {
    /// Pause when the in-flight cap is reached
    pub at_capacity_interval: Duration,
    /// Pause when nothing is claimable
    pub idle_interval: Duration,
    /// Pause after a store error
    pub error_backoff: Duration,
    /// How long shutdown waits for in-flight calls
    pub shutdown_grace: Duration,
}

impl Default for DispatchLoopConfig {
    fn default() -> Self {
        Self {
            at_capacity_interval: Duration::from_secs(5),
            idle_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Result of one admission + claim step
#[derive(Debug)]
pub enum Tick {
    AtCapacity,
    Idle,
    Claimed(Call),
}

pub struct DispatchLoop<R, I>
where
    R: CallRepository + ?Sized,
    I: CallInitiator + ?Sized,
{
    repo: Arc<R>,
    gate: ConcurrencyGate<R>,
    dispatcher: Arc<CallDispatcher<R, I>>,
    config: DispatchLoopConfig,
}

impl<R, I> DispatchLoop<R, I>
where
    R: CallRepository + ?Sized + 'static,
    I: CallInitiator + ?Sized + 'static,
{
    pub fn new(
        repo: Arc<R>,
        gate: ConcurrencyGate<R>,
        dispatcher: Arc<CallDispatcher<R, I>>,
        config: DispatchLoopConfig,
    ) -> Self {
        Self {
            repo,
            gate,
            dispatcher,
            config,
        }
    }

    /// Start the loop (runs in background until `shutdown` flips to true)
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    pub async fn tick(&self) -> Result<Tick, DomainError> {
        if !self.gate.admitted().await? {
            return Ok(Tick::AtCapacity);
        }

        match self.repo.claim_oldest_pending(Utc::now()).await? {
            Some(call) => Ok(Tick::Claimed(call)),
            None => Ok(Tick::Idle),
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "📡 Dispatch loop started (max concurrent: {})",
            self.gate.max_concurrent()
        );

        let mut in_flight = InFlight::default();

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.reap(&mut in_flight).await;

            let pause = match self.tick().await {
                Ok(Tick::Claimed(call)) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let job = call.clone();
                    let handle = in_flight
                        .tasks
                        .spawn(async move { dispatcher.process_detached(job).await });
                    in_flight.calls.insert(handle.id(), call);
                    continue;
                }
                Ok(Tick::AtCapacity) => {
                    tracing::debug!("At capacity, waiting");
                    self.config.at_capacity_interval
                }
                Ok(Tick::Idle) => self.config.idle_interval,
                Err(e) => {
                    tracing::warn!("⚠️  Dispatch tick failed: {}", e);
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("📡 Dispatch loop stopping, no new claims");
        self.drain(in_flight).await;
    }

    /// Collect finished per-call tasks without waiting
    async fn reap(&self, in_flight: &mut InFlight) {
        while let Some(result) = in_flight.tasks.try_join_next_with_id() {
            self.finished(in_flight, result).await;
        }
    }

    async fn finished(
        &self,
        in_flight: &mut InFlight,
        result: Result<(task::Id, ()), JoinError>,
    ) {
        let e = match result {
            Ok((id, ())) => {
                in_flight.calls.remove(&id);
                return;
            }
            Err(e) => e,
        };

        let call = in_flight.calls.remove(&e.id());
        if !e.is_panic() {
            tracing::error!("❌ Call task aborted: {}", e);
            return;
        }

        let Some(call) = call else {
            tracing::error!("❌ Call task panicked: {}", e);
            return;
        };

        // The task died before recording anything; release the slot
        tracing::error!(call_id = %call.id, "❌ Call task panicked: {}", e);
        let reason = "Processing error: call task panicked".to_string();
        self.dispatcher.record_processing_failure(&call, reason).await;
    }

    async fn drain(&self, mut in_flight: InFlight) {
        if in_flight.tasks.is_empty() {
            return;
        }

        let grace = self.config.shutdown_grace;
        tracing::info!(
            "⏳ Waiting up to {:?} for {} in-flight call(s)",
            grace,
            in_flight.tasks.len()
        );

        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = in_flight.tasks.join_next_with_id().await {
                self.finished(&mut in_flight, result).await;
            }
        })
        .await;

        if finished.is_err() {
            tracing::warn!(
                "⚠️  Abandoning {} in-flight call(s) after grace period",
                in_flight.tasks.len()
            );
            for call in in_flight.calls.values() {
                tracing::warn!(call_id = %call.id, "Call left IN_PROGRESS until reclaimed");
            }
            in_flight.tasks.abort_all();
        }
    }
}

/// Per-call tasks and the call each one is working on
#[derive(Default)]
struct InFlight {
    tasks: JoinSet<()>,
    calls: HashMap<task::Id, Call>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::{InMemoryCallRepository, ScriptedInitiator};
    use crate::application::RetryScheduler;
    use dialer::{CallStatus, RetryPolicy};

    fn fast_config() -> DispatchLoopConfig {
        DispatchLoopConfig {
            at_capacity_interval: Duration::from_millis(10),
            idle_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(200),
        }
    }

    fn dispatch_loop(
        repo: Arc<InMemoryCallRepository>,
        initiator: Arc<ScriptedInitiator>,
        max_concurrent: i64,
        config: DispatchLoopConfig,
    ) -> DispatchLoop<InMemoryCallRepository, ScriptedInitiator> {
        let scheduler = RetryScheduler::new(repo.clone(), RetryPolicy::default());
        let dispatcher = Arc::new(CallDispatcher::new(
            repo.clone(),
            initiator,
            scheduler,
            "http://dialer.test/callbacks/completion",
        ));
        let gate = ConcurrencyGate::new(repo.clone(), max_concurrent);
        DispatchLoop::new(repo, gate, dispatcher, config)
    }

    fn seed_pending(repo: &InMemoryCallRepository, n: usize) -> Vec<uuid::Uuid> {
        (0..n)
            .map(|i| {
                let mut call = Call::new(format!("+1415555{:04}", i), "welcome".into(), None);
                call.created_at -= chrono::Duration::seconds((n - i) as i64);
                let id = call.id;
                repo.seed(call);
                id
            })
            .collect()
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_tick_claims_oldest_first() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let ids = seed_pending(&repo, 3);
        let dispatch = dispatch_loop(repo.clone(), Arc::new(ScriptedInitiator::new()), 10, fast_config());

        let Tick::Claimed(call) = dispatch.tick().await.unwrap() else {
            panic!("expected a claim");
        };
        assert_eq!(call.id, ids[0]);
        assert_eq!(call.status, CallStatus::InProgress);
    }

    #[tokio::test]
    async fn test_tick_reports_at_capacity_and_idle() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let dispatch = dispatch_loop(repo.clone(), Arc::new(ScriptedInitiator::new()), 1, fast_config());

        assert!(matches!(dispatch.tick().await.unwrap(), Tick::Idle));

        seed_pending(&repo, 2);
        assert!(matches!(dispatch.tick().await.unwrap(), Tick::Claimed(_)));
        assert!(matches!(dispatch.tick().await.unwrap(), Tick::AtCapacity));
    }

    #[tokio::test]
    async fn test_concurrent_ticks_claim_one_record_once() {
        let repo = Arc::new(InMemoryCallRepository::new());
        seed_pending(&repo, 1);
        let dispatch = Arc::new(dispatch_loop(
            repo.clone(),
            Arc::new(ScriptedInitiator::new()),
            100,
            fast_config(),
        ));

        let mut ticks = JoinSet::new();
        for _ in 0..16 {
            let dispatch = dispatch.clone();
            ticks.spawn(async move { dispatch.tick().await });
        }

        let mut claimed = 0;
        while let Some(result) = ticks.join_next().await {
            if let Tick::Claimed(_) = result.unwrap().unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_loop_dispatches_all_pending_calls() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let initiator = Arc::new(ScriptedInitiator::new());
        seed_pending(&repo, 4);

        let (tx, rx) = watch::channel(false);
        let handle = dispatch_loop(repo.clone(), initiator.clone(), 10, fast_config()).start(rx);

        wait_until(|| {
            repo.all()
                .iter()
                .all(|c| c.external_call_id.is_some())
        })
        .await;
        assert_eq!(initiator.requests().len(), 4);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_slow_provider_does_not_block_claiming() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let initiator =
            Arc::new(ScriptedInitiator::new().with_delay(Duration::from_millis(500)));
        seed_pending(&repo, 3);

        let (tx, rx) = watch::channel(false);
        let handle = dispatch_loop(repo.clone(), initiator.clone(), 10, fast_config()).start(rx);

        // All three requests are in flight long before the first one answers
        wait_until(|| initiator.requests().len() == 3).await;
        assert!(repo.all().iter().all(|c| c.external_call_id.is_none()));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_respects_concurrency_cap() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let initiator =
            Arc::new(ScriptedInitiator::new().with_delay(Duration::from_millis(100)));
        seed_pending(&repo, 5);

        let (tx, rx) = watch::channel(false);
        let handle = dispatch_loop(repo.clone(), initiator.clone(), 2, fast_config()).start(rx);

        wait_until(|| initiator.requests().len() == 2).await;
        sleep(Duration::from_millis(30)).await;
        assert_eq!(initiator.requests().len(), 2);
        assert_eq!(
            repo.all()
                .iter()
                .filter(|c| c.status == CallStatus::InProgress)
                .count(),
            2
        );

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_survives_store_outage() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let initiator = Arc::new(ScriptedInitiator::new());
        seed_pending(&repo, 2);
        repo.set_unavailable(true);

        let (tx, rx) = watch::channel(false);
        let handle = dispatch_loop(repo.clone(), initiator.clone(), 10, fast_config()).start(rx);

        sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert!(initiator.requests().is_empty());

        repo.set_unavailable(false);
        wait_until(|| {
            repo.all()
                .iter()
                .all(|c| c.external_call_id.is_some())
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicked_call_task_is_rescheduled() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let initiator = Arc::new(ScriptedInitiator::panicking());
        let id = seed_pending(&repo, 1)[0];

        let (tx, rx) = watch::channel(false);
        let handle = dispatch_loop(repo.clone(), initiator.clone(), 1, fast_config()).start(rx);

        wait_until(|| repo.get(id).unwrap().last_error.is_some()).await;

        // Slot released and the attempt counted; next try waits for backoff
        let stored = repo.get(id).unwrap();
        assert_eq!(stored.status, CallStatus::Pending);
        assert_eq!(stored.attempts, 1);
        assert_eq!(
            stored.last_error.as_deref(),
            Some("Processing error: call task panicked")
        );
        assert!(stored.next_attempt_at.is_some());
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_abandons_calls_after_grace() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let initiator = Arc::new(ScriptedInitiator::new().with_delay(Duration::from_secs(30)));
        seed_pending(&repo, 1);

        let (tx, rx) = watch::channel(false);
        let handle = dispatch_loop(repo.clone(), initiator.clone(), 10, fast_config()).start(rx);

        wait_until(|| initiator.requests().len() == 1).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        // Left IN_PROGRESS; the provider call was abandoned
        assert_eq!(repo.all()[0].status, CallStatus::InProgress);
    }

    #[tokio::test]
    async fn test_stops_when_shutdown_sender_dropped() {
        let repo = Arc::new(InMemoryCallRepository::new());
        let (tx, rx) = watch::channel(false);
        let handle =
            dispatch_loop(repo, Arc::new(ScriptedInitiator::new()), 10, fast_config()).start(rx);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
