//! Cache consumer for executing consumption plans.
//!
//! Drains events from the queue, plans them and hands every step to the
//! registry.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::metrics::CONSUME_MS;
use super::planner::ConsumptionPlan;
use super::registry::{CacheRegistry, DispatchOutcome};

/// Background maintenance loop.
///
/// The consumer:
/// 1. Drains up to `consume_batch_limit` events
/// 2. Generates a consumption plan from the events
/// 3. Dispatches the plan's steps to the registry in order
pub struct CacheConsumer {
    config: CacheConfig,
    registry: Arc<CacheRegistry>,
    queue: Arc<EventQueue>,
}

impl CacheConsumer {
    pub fn new(config: CacheConfig, registry: Arc<CacheRegistry>, queue: Arc<EventQueue>) -> Self {
        Self {
            config,
            registry,
            queue,
        }
    }

    /// Consume one batch of pending events.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> bool {
        self.consume_batch().await.is_some()
    }

    /// Like [`consume`](Self::consume) but hands back the folded outcome.
    pub async fn consume_batch(&self) -> Option<DispatchOutcome> {
        let started = Instant::now();
        let events = self.queue.drain(self.config.consume_batch_limit);
        if events.is_empty() {
            return None;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|event| event.id).collect();
        let plan = ConsumptionPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        let outcome = self.registry.dispatch_all(&plan.steps).await;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(CONSUME_MS).record(elapsed_ms);

        if outcome.is_success() {
            info!(
                event_count,
                resynced = outcome.resynced.len(),
                inserted = outcome.inserted.len(),
                elapsed_ms,
                "Cache consumption complete"
            );
        } else {
            warn!(
                event_count,
                failed = ?outcome.failed,
                elapsed_ms,
                "Cache consumption finished with view failures"
            );
        }

        Some(outcome)
    }

    /// Keep consuming until the queue is empty.
    pub async fn consume_pending(&self) -> usize {
        let mut batches = 0;
        while self.consume().await {
            batches += 1;
        }
        batches
    }

    /// Run forever, waking on publish or every poll interval.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            batch_limit = self.config.consume_batch_limit,
            "Cache consumer started"
        );

        loop {
            tokio::select! {
                _ = self.queue.notified() => {}
                _ = ticker.tick() => {}
            }
            self.consume_pending().await;
        }
    }
}
