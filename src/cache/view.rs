//! Ranked view abstraction and the generation layout shared by all views.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::assembly::AssemblyError;
use crate::application::repos::RepoError;
use crate::domain::entities::CacheEntry;

use super::keys::{GENERATION_FIELD, ViewKeys, ViewKind, position_field};
use super::store::{BackingStore, FieldGuard, StoreError, WriteBatch};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("primary store query failed: {0}")]
    Repo(#[from] RepoError),
    #[error("cache entry assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{view} view kept changing; gave up after {attempts} attempts")]
    Contention { view: ViewKind, attempts: usize },
}

/// One occupied slot of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedPosition {
    /// 1-based position or rank.
    pub position: usize,
    pub entry: CacheEntry,
}

/// A bounded, ranked projection of the primary store.
#[async_trait]
pub trait View: Send + Sync {
    fn kind(&self) -> ViewKind;

    /// Targeted update for a freshly created post.
    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Rebuild the whole view from the primary store.
    async fn sync_from_data_storage(&self) -> Result<(), CacheError>;

    /// Post ids currently held by the view.
    async fn member_ids(&self) -> Result<HashSet<Uuid>, CacheError>;

    /// Current generation ordered by position.
    async fn entries(&self) -> Result<Vec<CachedPosition>, CacheError>;

    /// Position of a post according to the view's index.
    async fn position_of(&self, post_id: Uuid) -> Result<Option<usize>, CacheError>;

    /// Whether follow/comment counts feed the ranking.
    fn tracks_engagement(&self) -> bool {
        false
    }

    fn key(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Start a batch that drops the previous generation of a view and stamps a
/// fresh generation token.
pub(crate) fn replace_generation(keys: &ViewKeys) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch
        .del(keys.entries())
        .del(keys.index())
        .del(keys.members())
        .hset(keys.meta(), GENERATION_FIELD, Uuid::new_v4().to_string());
    batch
}

/// Token of the generation currently stored, `None` before the first write.
pub(crate) async fn read_generation(
    store: &dyn BackingStore,
    keys: &ViewKeys,
) -> Result<Option<String>, CacheError> {
    Ok(store.hash_get(keys.meta(), GENERATION_FIELD).await?)
}

/// Guard that holds while the view is still at `generation`.
pub(crate) fn generation_guard(keys: &ViewKeys, generation: Option<String>) -> FieldGuard {
    FieldGuard {
        key: keys.meta().to_string(),
        field: GENERATION_FIELD.to_string(),
        expected: generation,
    }
}

/// Append one slot (entry, index, membership) to a generation batch.
pub(crate) fn push_slot(
    batch: &mut WriteBatch,
    keys: &ViewKeys,
    position: usize,
    entry: &CacheEntry,
) -> Result<(), CacheError> {
    let id = entry.post_id().to_string();
    let payload = serde_json::to_string(entry)?;
    batch
        .hset(keys.entries(), position_field(position), payload)
        .hset(keys.index(), id.clone(), position.to_string())
        .sadd(keys.members(), id);
    Ok(())
}

pub(crate) async fn read_members(
    store: &dyn BackingStore,
    keys: &ViewKeys,
) -> Result<HashSet<Uuid>, CacheError> {
    let raw = store.set_members(keys.members()).await?;
    Ok(raw
        .iter()
        .filter_map(|member| match Uuid::parse_str(member) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(
                    view = %keys.view(),
                    member = %member,
                    error = %err,
                    "Skipping malformed view member"
                );
                None
            }
        })
        .collect())
}

/// Read the entries hash; undecodable slots are skipped and logged.
pub(crate) async fn read_positions(
    store: &dyn BackingStore,
    keys: &ViewKeys,
) -> Result<Vec<CachedPosition>, CacheError> {
    let raw = store.hash_get_all(keys.entries()).await?;
    let mut positions: Vec<CachedPosition> = raw
        .iter()
        .filter_map(|(field, payload)| {
            let position = field.parse::<usize>().ok()?;
            match serde_json::from_str::<CacheEntry>(payload) {
                Ok(entry) => Some(CachedPosition { position, entry }),
                Err(err) => {
                    warn!(
                        view = %keys.view(),
                        position,
                        error = %err,
                        "Skipping undecodable cache entry"
                    );
                    None
                }
            }
        })
        .collect();
    positions.sort_by_key(|slot| slot.position);
    Ok(positions)
}

/// Position recorded for a post in the view's index, if any.
pub(crate) async fn read_position(
    store: &dyn BackingStore,
    keys: &ViewKeys,
    post_id: Uuid,
) -> Result<Option<usize>, CacheError> {
    let raw = store.hash_get(keys.index(), &post_id.to_string()).await?;
    Ok(raw.and_then(|value| value.parse().ok()))
}
