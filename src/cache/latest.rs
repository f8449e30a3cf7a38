//! Sliding window of the most recently updated posts.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::assembly::AssemblyService;
use crate::application::repos::PostsRepo;
use crate::domain::entities::CacheEntry;

use super::config::CacheConfig;
use super::keys::{ViewKeys, ViewKind};
use super::store::BackingStore;
use super::store::WriteBatch;
use super::view::{
    CacheError, CachedPosition, View, generation_guard, push_slot, read_generation, read_members,
    read_position, read_positions, replace_generation,
};

/// Shift attempts before an insert gives up to a concurrent writer.
const MAX_INSERT_ATTEMPTS: usize = 5;

/// Newest first; equal timestamps put the higher post id first.
pub fn recency_order(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    b.post
        .updated_at
        .cmp(&a.post.updated_at)
        .then_with(|| b.post.id.cmp(&a.post.id))
}

pub struct LatestView {
    store: Arc<dyn BackingStore>,
    posts: Arc<dyn PostsRepo>,
    assembly: AssemblyService,
    keys: ViewKeys,
    capacity: usize,
}

impl LatestView {
    pub fn new(
        config: &CacheConfig,
        store: Arc<dyn BackingStore>,
        posts: Arc<dyn PostsRepo>,
        assembly: AssemblyService,
    ) -> Self {
        Self {
            store,
            posts,
            assembly,
            keys: ViewKeys::new(&config.key_prefix, ViewKind::Latest),
            capacity: config.view_capacity_non_zero().get(),
        }
    }

    pub fn keys(&self) -> &ViewKeys {
        &self.keys
    }

    fn generation_batch(&self, entries: &[CacheEntry]) -> Result<WriteBatch, CacheError> {
        let mut batch = replace_generation(&self.keys);
        for (offset, entry) in entries.iter().take(self.capacity).enumerate() {
            push_slot(&mut batch, &self.keys, offset + 1, entry)?;
        }
        Ok(batch)
    }

    /// Listing limit for the primary store; capacities past `u32::MAX` saturate.
    fn query_limit(&self) -> u32 {
        u32::try_from(self.capacity).unwrap_or(u32::MAX)
    }
}

/// `entry` at the front, its previous copy dropped, trimmed to `capacity`.
fn shifted(entry: &CacheEntry, current: Vec<CachedPosition>, capacity: usize) -> Vec<CacheEntry> {
    let mut next = Vec::with_capacity(capacity);
    next.push(entry.clone());
    next.extend(
        current
            .into_iter()
            .map(|slot| slot.entry)
            .filter(|existing| existing.post_id() != entry.post_id()),
    );
    next.truncate(capacity);
    next
}

#[async_trait]
impl View for LatestView {
    fn kind(&self) -> ViewKind {
        ViewKind::Latest
    }

    /// Put the entry at position 1 and shift everything else down by one.
    ///
    /// The new generation is written only if no other writer replaced the view
    /// since it was read; otherwise the shift is rebuilt from the fresh state.
    #[instrument(skip(self, entry), fields(post_id = %entry.post_id()))]
    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        if !entry.post.is_cache_eligible() {
            debug!("Latest insert skipped: post not eligible");
            return Ok(());
        }

        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let generation = read_generation(self.store.as_ref(), &self.keys).await?;
            let current = read_positions(self.store.as_ref(), &self.keys).await?;
            let next = shifted(entry, current, self.capacity);

            let batch = self.generation_batch(&next)?;
            let guard = generation_guard(&self.keys, generation);
            if self.store.execute_if(&guard, batch).await? {
                debug!(size = next.len(), attempt, "Latest insert applied");
                return Ok(());
            }
            debug!(attempt, "Latest view changed during insert; retrying");
        }

        Err(CacheError::Contention {
            view: ViewKind::Latest,
            attempts: MAX_INSERT_ATTEMPTS,
        })
    }

    #[instrument(skip(self))]
    async fn sync_from_data_storage(&self) -> Result<(), CacheError> {
        let posts = self.posts.list_latest_published(self.query_limit()).await?;

        let mut entries = Vec::with_capacity(posts.len());
        for post in posts.into_iter().filter(|post| post.is_cache_eligible()) {
            entries.push(self.assembly.with_head_comments(post).await?);
        }
        entries.sort_by(recency_order);
        entries.truncate(self.capacity);

        let batch = self.generation_batch(&entries)?;
        self.store.execute(batch).await?;
        debug!(size = entries.len(), "Latest view resynced");
        Ok(())
    }

    async fn member_ids(&self) -> Result<HashSet<Uuid>, CacheError> {
        read_members(self.store.as_ref(), &self.keys).await
    }

    async fn entries(&self) -> Result<Vec<CachedPosition>, CacheError> {
        read_positions(self.store.as_ref(), &self.keys).await
    }

    async fn position_of(&self, post_id: Uuid) -> Result<Option<usize>, CacheError> {
        read_position(self.store.as_ref(), &self.keys, post_id).await
    }
}
