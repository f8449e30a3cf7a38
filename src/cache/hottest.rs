//! Top-K posts by weighted popularity.
//!
//! Ranking needs every eligible post's score, so this view only changes through
//! a full resync:
//!
//! 1. one aggregate query scores every active, published post;
//! 2. the top `min(N, count)` are selected and ranked 1..=k, plus a few
//!    runners-up that fill in for posts deleted or unpublished between the two
//!    queries;
//! 3. a second query hydrates only the selected ids;
//! 4. one atomic batch writes per-rank field hashes, serialized entries, the
//!    id → rank index and the membership set.
//!
//! A view can still come up short when more selected posts drop out than there
//! are runners-up; the next resync restores it.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::application::repos::PostsRepo;
use crate::domain::entities::{CacheEntry, EngagementRecord, PostDetail, is_cache_eligible};

use super::config::CacheConfig;
use super::keys::{ViewKeys, ViewKind};
use super::store::{BackingStore, WriteBatch};
use super::view::{
    CacheError, CachedPosition, View, push_slot, read_members, read_position, read_positions,
    replace_generation,
};

pub const FOLLOW_WEIGHT: f64 = 0.6;
pub const COMMENT_WEIGHT: f64 = 0.4;

/// Runners-up hydrated beyond the view capacity.
const HYDRATION_MARGIN: usize = 5;

pub fn popularity_score(follow_count: i64, comment_count: i64) -> f64 {
    FOLLOW_WEIGHT * follow_count.max(0) as f64 + COMMENT_WEIGHT * comment_count.max(0) as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub post_id: Uuid,
    pub score: f64,
    pub follow_count: i64,
    pub comment_count: i64,
    /// 1-based.
    pub rank: usize,
}

/// Higher score first; equal scores put the higher post id first.
fn score_order(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.post_id.cmp(&a.post_id))
}

/// Score eligible rows and keep the best `capacity`, ranked from 1.
pub fn rank_candidates(rows: Vec<EngagementRecord>, capacity: usize) -> Vec<ScoreRecord> {
    let mut scored: Vec<ScoreRecord> = rows
        .into_iter()
        .filter(|row| is_cache_eligible(row.active, row.status))
        .map(|row| ScoreRecord {
            post_id: row.post_id,
            score: popularity_score(row.follow_count, row.comment_count),
            follow_count: row.follow_count,
            comment_count: row.comment_count,
            rank: 0,
        })
        .collect();

    scored.sort_by(score_order);
    scored.truncate(capacity);
    for (offset, record) in scored.iter_mut().enumerate() {
        record.rank = offset + 1;
    }
    scored
}

pub struct HottestView {
    store: Arc<dyn BackingStore>,
    posts: Arc<dyn PostsRepo>,
    keys: ViewKeys,
    capacity: usize,
}

impl HottestView {
    pub fn new(
        config: &CacheConfig,
        store: Arc<dyn BackingStore>,
        posts: Arc<dyn PostsRepo>,
    ) -> Self {
        Self {
            store,
            posts,
            keys: ViewKeys::new(&config.key_prefix, ViewKind::Hottest),
            capacity: config.view_capacity_non_zero().get(),
        }
    }

    pub fn keys(&self) -> &ViewKeys {
        &self.keys
    }

    /// Flat fields stored for one rank, read without deserializing the entry.
    pub async fn rank_fields(&self, rank: usize) -> Result<HashMap<String, String>, CacheError> {
        Ok(self.store.hash_get_all(&self.keys.rank(rank)).await?)
    }

    fn push_rank_fields(
        &self,
        batch: &mut WriteBatch,
        rank: usize,
        record: &ScoreRecord,
        post: &PostDetail,
    ) {
        let key = self.keys.rank(rank);
        batch
            .hset(key.clone(), "id", post.id.to_string())
            .hset(key.clone(), "title", post.title.clone())
            .hset(key.clone(), "excerpt", post.excerpt.clone())
            .hset(key.clone(), "author_id", post.author.id.to_string())
            .hset(key.clone(), "author_nickname", post.author.nickname.clone())
            .hset(
                key.clone(),
                "author_avatar",
                post.author.avatar.clone().unwrap_or_default(),
            )
            .hset(key.clone(), "follow_count", record.follow_count.to_string())
            .hset(key.clone(), "comment_count", record.comment_count.to_string())
            .hset(key.clone(), "score", record.score.to_string())
            .hset(key, "updated_at", post.updated_at.unix_timestamp().to_string());
    }
}

#[async_trait]
impl View for HottestView {
    fn kind(&self) -> ViewKind {
        ViewKind::Hottest
    }

    /// A single post cannot be ranked without re-scoring the corpus.
    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        debug!(post_id = %entry.post_id(), "Hottest insert ignored; resync required to re-rank");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn sync_from_data_storage(&self) -> Result<(), CacheError> {
        // Phase 1 + 2: score the corpus, select the top k and the runners-up.
        let candidates = self.posts.list_engagement().await?;
        let candidate_count = candidates.len();
        let selected = rank_candidates(
            candidates,
            self.capacity.saturating_add(HYDRATION_MARGIN),
        );

        // Phase 3: hydrate only the selected ids.
        let ids: Vec<Uuid> = selected.iter().map(|record| record.post_id).collect();
        let mut details: HashMap<Uuid, PostDetail> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.posts
                .find_posts_by_ids(&ids)
                .await?
                .into_iter()
                .map(|post| (post.id, post))
                .collect()
        };

        // Phase 4: one batch for the whole generation.
        let mut batch = replace_generation(&self.keys);
        for rank in 1..=self.capacity {
            batch.del(self.keys.rank(rank));
        }

        let mut rank = 0;
        for record in &selected {
            if rank == self.capacity {
                break;
            }
            let Some(post) = details.remove(&record.post_id) else {
                warn!(
                    post_id = %record.post_id,
                    "Ranked post vanished before hydration; skipping"
                );
                continue;
            };
            if !post.is_cache_eligible() {
                warn!(
                    post_id = %record.post_id,
                    "Ranked post became ineligible before hydration; skipping"
                );
                continue;
            }

            rank += 1;
            let record = ScoreRecord {
                rank,
                ..record.clone()
            };
            self.push_rank_fields(&mut batch, rank, &record, &post);
            let entry = CacheEntry::new(post).with_score(record.score);
            push_slot(&mut batch, &self.keys, rank, &entry)?;
        }

        self.store.execute(batch).await?;
        debug!(candidates = candidate_count, size = rank, "Hottest view resynced");
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

    fn tracks_engagement(&self) -> bool {
        true
    }
}
