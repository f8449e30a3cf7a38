//! View registry.
//!
//! Decides per lifecycle event whether registered views get a targeted insert
//! or a full resync, and runs that work best-effort: a failing view is logged
//! and counted while the remaining views proceed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::application::assembly::AssemblyService;
use crate::application::repos::{CommentsRepo, PostsRepo};
use crate::domain::posts::{BulkStatusUpdate, PostUpdate};

use super::config::CacheConfig;
use super::events::EventKind;
use super::hottest::HottestView;
use super::latest::LatestView;
use super::metrics::{RESYNC_FAILED_TOTAL, RESYNC_MS};
use super::store::BackingStore;
use super::view::{CacheError, View};

/// A view whose part of an operation was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFailure {
    pub view: &'static str,
    pub error: String,
}

/// What one registry operation did to each view.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub inserted: Vec<&'static str>,
    pub resynced: Vec<&'static str>,
    pub failed: Vec<ViewFailure>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// True when no view was touched and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty() && self.resynced.is_empty() && self.failed.is_empty()
    }

    fn fail(&mut self, view: &'static str, error: impl fmt::Display) {
        self.failed.push(ViewFailure {
            view,
            error: error.to_string(),
        });
    }

    fn merge(&mut self, other: DispatchOutcome) {
        self.inserted.extend(other.inserted);
        self.resynced.extend(other.resynced);
        self.failed.extend(other.failed);
    }
}

pub struct CacheRegistry {
    views: Vec<Arc<dyn View>>,
    assembly: AssemblyService,
}

impl CacheRegistry {
    pub fn new(assembly: AssemblyService) -> Self {
        Self {
            views: Vec::new(),
            assembly,
        }
    }

    /// Registry holding the latest and hottest views over one backing store.
    pub fn with_default_views(
        config: &CacheConfig,
        store: Arc<dyn BackingStore>,
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        let assembly = AssemblyService::new(posts.clone(), comments)
            .with_head_comment_limit(config.head_comment_limit);

        let mut registry = Self::new(assembly.clone());
        registry.register(Arc::new(LatestView::new(
            config,
            store.clone(),
            posts.clone(),
            assembly,
        )));
        registry.register(Arc::new(HottestView::new(config, store, posts)));
        registry
    }

    /// Append a view. Registering the same view twice runs its work twice.
    pub fn register(&mut self, view: Arc<dyn View>) {
        debug!(view = view.key(), "View registered");
        self.views.push(view);
    }

    pub fn views(&self) -> &[Arc<dyn View>] {
        &self.views
    }

    /// Find the first registered view with the given key.
    pub fn view(&self, key: &str) -> Option<Arc<dyn View>> {
        self.views.iter().find(|view| view.key() == key).cloned()
    }

    /// Assemble the new post once and insert it into every view.
    #[instrument(skip(self))]
    pub async fn insert(&self, post_id: Uuid) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let entry = match self.assembly.assemble(post_id).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(post_id = %post_id, error = %err, "Cache entry assembly failed");
                for view in &self.views {
                    outcome.fail(view.key(), &err);
                }
                return outcome;
            }
        };

        if !entry.post.is_cache_eligible() {
            debug!(post_id = %post_id, "Post not eligible for ranked views; insert skipped");
            return outcome;
        }

        for view in &self.views {
            match view.insert(&entry).await {
                Ok(()) => outcome.inserted.push(view.key()),
                Err(err) => {
                    warn!(view = view.key(), post_id = %post_id, error = %err, "View insert failed");
                    outcome.fail(view.key(), err);
                }
            }
        }
        outcome
    }

    /// Structural updates rebuild everything; cosmetic ones only the views
    /// holding the post.
    #[instrument(skip(self), fields(post_id = %update.post_id))]
    pub async fn update(&self, update: &PostUpdate) -> DispatchOutcome {
        if update.is_structural() {
            return self.sync_from_data_storage().await;
        }
        let ids = HashSet::from([update.post_id]);
        self.resync_members_of(&ids).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, post_id: Uuid) -> DispatchOutcome {
        let ids = HashSet::from([post_id]);
        self.resync_members_of(&ids).await
    }

    #[instrument(skip(self, bulk), fields(posts = bulk.post_ids.len()))]
    pub async fn update_all(&self, bulk: &BulkStatusUpdate) -> DispatchOutcome {
        if bulk.is_structural() {
            return self.sync_from_data_storage().await;
        }
        self.resync_members_of(&bulk.post_ids).await
    }

    /// Re-rank every view that scores on follow/comment counts.
    #[instrument(skip(self))]
    pub async fn engagement_changed(&self, post_id: Uuid) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for view in self.views.iter().filter(|view| view.tracks_engagement()) {
            self.resync_view(view.as_ref(), &mut outcome).await;
        }
        outcome
    }

    /// Unconditionally rebuild every registered view.
    #[instrument(skip(self))]
    pub async fn sync_from_data_storage(&self) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for view in &self.views {
            self.resync_view(view.as_ref(), &mut outcome).await;
        }
        outcome
    }

    /// Rebuild a single view by key; `None` when no such view is registered.
    pub async fn sync_view(&self, key: &str) -> Option<DispatchOutcome> {
        let view = self.view(key)?;
        let mut outcome = DispatchOutcome::default();
        self.resync_view(view.as_ref(), &mut outcome).await;
        Some(outcome)
    }

    /// Route one queued event to the matching operation.
    pub async fn dispatch(&self, kind: &EventKind) -> DispatchOutcome {
        match kind {
            EventKind::PostCreated { post_id } => self.insert(*post_id).await,
            EventKind::PostUpdated(update) => self.update(update).await,
            EventKind::PostDeleted { post_id } => self.delete(*post_id).await,
            EventKind::PostsBulkUpdated(bulk) => self.update_all(bulk).await,
            EventKind::EngagementChanged { post_id } => self.engagement_changed(*post_id).await,
            EventKind::ResyncAll { reason } => {
                debug!(?reason, "Full resync requested");
                self.sync_from_data_storage().await
            }
        }
    }

    /// Run several events in order and fold their outcomes.
    pub async fn dispatch_all<'a>(
        &self,
        kinds: impl IntoIterator<Item = &'a EventKind>,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for kind in kinds {
            outcome.merge(self.dispatch(kind).await);
        }
        outcome
    }

    async fn resync_members_of(&self, ids: &HashSet<Uuid>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for view in &self.views {
            let members = match view.member_ids().await {
                Ok(members) => members,
                Err(err) => {
                    warn!(view = view.key(), error = %err, "Membership read failed; view left as is");
                    record_failure(view.key());
                    outcome.fail(view.key(), err);
                    continue;
                }
            };

            if members.is_disjoint(ids) {
                debug!(view = view.key(), "No affected members; resync skipped");
                continue;
            }
            self.resync_view(view.as_ref(), &mut outcome).await;
        }
        outcome
    }

    async fn resync_view(&self, view: &dyn View, outcome: &mut DispatchOutcome) {
        let started = Instant::now();
        let result: Result<(), CacheError> = view.sync_from_data_storage().await;
        histogram!(RESYNC_MS, "view" => view.key())
            .record(started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(()) => outcome.resynced.push(view.key()),
            Err(err) => {
                warn!(view = view.key(), error = %err, "View resync failed; previous generation kept");
                record_failure(view.key());
                outcome.fail(view.key(), err);
            }
        }
    }
}

fn record_failure(view: &'static str) {
    counter!(RESYNC_FAILED_TOTAL, "view" => view).increment(1);
}
