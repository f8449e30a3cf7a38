//! Cache event system.
//!
//! Mutation paths publish events into an in-memory queue; the consumer drains it
//! in the background.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::posts::{BulkStatusUpdate, PostUpdate};

use super::lock::recover;
use super::metrics::{EVENT_COLLAPSED_TOTAL, EVENT_QUEUE_LEN};

const SOURCE: &str = "cache::events";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Why every view is being rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    Startup,
    Scheduled,
    Manual,
    /// The queue overflowed and its pending events were folded into one resync.
    Overflow,
}

/// Lifecycle events that drive view maintenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PostCreated { post_id: Uuid },
    PostUpdated(PostUpdate),
    PostDeleted { post_id: Uuid },
    PostsBulkUpdated(BulkStatusUpdate),
    /// Follow/unfollow or comment activity changed a post's counts.
    EngagementChanged { post_id: Uuid },
    ResyncAll { reason: ResyncReason },
}

impl EventKind {
    /// Whether this event rebuilds every registered view.
    pub fn forces_full_resync(&self) -> bool {
        match self {
            EventKind::ResyncAll { .. } => true,
            EventKind::PostUpdated(update) => update.is_structural(),
            EventKind::PostsBulkUpdated(bulk) => bulk.is_structural(),
            EventKind::PostCreated { .. }
            | EventKind::PostDeleted { .. }
            | EventKind::EngagementChanged { .. } => false,
        }
    }
}

/// Bounded in-memory event queue.
///
/// Contention is low (a push per content mutation), so a mutex suffices. When
/// the limit is hit, everything pending is replaced by one full resync, which
/// subsumes any targeted update.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
    limit: usize,
    notify: Notify,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::new_with_limit(usize::MAX)
    }

    pub fn new_with_limit(limit: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
            limit: limit.max(1),
            notify: Notify::new(),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Enqueue an event and wake the consumer.
    pub fn publish(&self, kind: EventKind) {
        let event = CacheEvent::new(kind, self.next_epoch());

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Cache event enqueued"
        );

        let len = {
            let mut queue = recover(self.queue.lock(), SOURCE, "publish");
            if queue.len() >= self.limit {
                let collapsed = queue.len();
                queue.clear();
                queue.push_back(CacheEvent::new(
                    EventKind::ResyncAll {
                        reason: ResyncReason::Overflow,
                    },
                    self.next_epoch(),
                ));
                warn!(
                    collapsed,
                    limit = self.limit,
                    "Cache event queue overflowed; collapsed into full resync"
                );
                counter!(EVENT_COLLAPSED_TOTAL).increment(collapsed as u64);
            }
            queue.push_back(event);
            queue.len()
        };

        gauge!(EVENT_QUEUE_LEN).set(len as f64);
        self.notify.notify_one();
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let (events, remaining) = {
            let mut queue = recover(self.queue.lock(), SOURCE, "drain");
            let count = limit.min(queue.len());
            let events: Vec<CacheEvent> = queue.drain(..count).collect();
            (events, queue.len())
        };
        gauge!(EVENT_QUEUE_LEN).set(remaining as f64);
        events
    }

    /// Resolve once an event has been published since the last wake-up.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        recover(self.queue.lock(), SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::time::Duration;

    use super::*;
    use crate::domain::types::PublishStatus;

    fn created(id: u128) -> EventKind {
        EventKind::PostCreated {
            post_id: Uuid::from_u128(id),
        }
    }

    #[test]
    fn epoch_monotonicity() {
        let queue = EventQueue::new();

        let e1 = queue.next_epoch();
        let e2 = queue.next_epoch();
        let e3 = queue.next_epoch();

        assert!(e1 < e2);
        assert!(e2 < e3);
    }

    #[test]
    fn publish_and_drain_fifo() {
        let queue = EventQueue::new();

        queue.publish(created(1));
        queue.publish(created(2));
        queue.publish(EventKind::ResyncAll {
            reason: ResyncReason::Manual,
        });
        assert_eq!(queue.len(), 3);

        let events = queue.drain(2);
        assert_eq!(events.len(), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(events[0].kind, created(1));
        assert_eq!(events[1].kind, created(2));
        assert!(events[0].epoch < events[1].epoch);
    }

    #[test]
    fn drain_more_than_available() {
        let queue = EventQueue::new();
        queue.publish(created(1));

        assert_eq!(queue.drain(100).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_collapses_into_full_resync() {
        let queue = EventQueue::new_with_limit(2);

        queue.publish(created(1));
        queue.publish(created(2));
        queue.publish(created(3));

        let events = queue.drain(10);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].kind,
            EventKind::ResyncAll {
                reason: ResyncReason::Overflow
            }
        );
        assert_eq!(events[1].kind, created(3));
    }

    #[test]
    fn full_resync_classification() {
        let id = Uuid::new_v4();
        assert!(
            EventKind::ResyncAll {
                reason: ResyncReason::Startup
            }
            .forces_full_resync()
        );
        assert!(EventKind::PostUpdated(PostUpdate::cosmetic(id).with_active(false)).forces_full_resync());
        assert!(!EventKind::PostUpdated(PostUpdate::cosmetic(id)).forces_full_resync());
        assert!(!EventKind::PostDeleted { post_id: id }.forces_full_resync());
        assert!(!EventKind::EngagementChanged { post_id: id }.forces_full_resync());

        let bulk = BulkStatusUpdate::new([id]).expect("bulk");
        assert!(!EventKind::PostsBulkUpdated(bulk.clone()).forces_full_resync());
        assert!(
            EventKind::PostsBulkUpdated(bulk.with_status(PublishStatus::Archived))
                .forces_full_resync()
        );
    }

    #[tokio::test]
    async fn publish_wakes_waiting_consumer() {
        let queue = EventQueue::new();
        queue.publish(created(1));

        // The permit stored by publish resolves the next wait immediately.
        tokio::time::timeout(Duration::from_secs(1), queue.notified())
            .await
            .expect("notification should be pending");
    }

    #[test]
    fn event_queue_recovers_from_poisoned_lock() {
        let queue = EventQueue::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = queue.queue.lock().expect("queue lock should be acquired");
            panic!("poison queue lock");
        }));

        queue.publish(created(1));
        assert_eq!(queue.len(), 1);
    }
}
