//! Cache trigger service.
//!
//! The entry point mutation paths call after their write has committed. Every
//! method only enqueues; the consumer does the work in the background, so no
//! cache failure ever reaches the caller.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::domain::posts::{BulkStatusUpdate, PostUpdate};

use super::config::CacheConfig;
use super::events::{EventKind, EventQueue, ResyncReason};

/// Cache trigger for publishing cache events.
///
/// # Usage
///
/// ```ignore
/// // After a successful post update:
/// trigger.post_updated(PostUpdate::cosmetic(post.id));
/// ```
#[derive(Clone)]
pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>) -> Self {
        Self { config, queue }
    }

    /// Publish an event unless the cache is disabled.
    pub fn trigger(&self, kind: EventKind) {
        if !self.config.enabled {
            debug!(event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return;
        }
        self.queue.publish(kind);
    }

    pub fn post_created(&self, post_id: Uuid) {
        self.trigger(EventKind::PostCreated { post_id });
    }

    pub fn post_updated(&self, update: PostUpdate) {
        self.trigger(EventKind::PostUpdated(update));
    }

    pub fn post_deleted(&self, post_id: Uuid) {
        self.trigger(EventKind::PostDeleted { post_id });
    }

    pub fn posts_bulk_updated(&self, bulk: BulkStatusUpdate) {
        self.trigger(EventKind::PostsBulkUpdated(bulk));
    }

    /// Follow, unfollow or a new comment on a post.
    pub fn engagement_changed(&self, post_id: Uuid) {
        self.trigger(EventKind::EngagementChanged { post_id });
    }

    pub fn resync_all(&self, reason: ResyncReason) {
        self.trigger(EventKind::ResyncAll { reason });
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }
}
