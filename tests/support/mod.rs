#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use postrank::application::repos::{CommentFilter, CommentsRepo, PostsRepo, RepoError};
use postrank::cache::{
    BackingStore, CacheConfig, FieldGuard, MemoryStore, StoreError, WriteBatch,
};
use postrank::domain::entities::{
    AuthorView, CommentView, EngagementRecord, FollowEdge, PostDetail, post_follow_counts,
};
use postrank::domain::types::{PublishStatus, ResourceType};
use time::{Duration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

pub const BASE_TIME: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn config(capacity: usize) -> CacheConfig {
    CacheConfig {
        view_capacity: capacity,
        ..CacheConfig::default()
    }
}

/// Active, published post updated `minutes` after [`BASE_TIME`].
pub fn post(n: u128, minutes: i64) -> PostDetail {
    PostDetail {
        id: id(n),
        title: format!("post {n}"),
        excerpt: format!("excerpt {n}"),
        active: true,
        status: PublishStatus::Published,
        comment_amount: 0,
        tags: vec!["rust".to_string()],
        project: None,
        author: AuthorView {
            id: id(1_000 + n),
            nickname: format!("author-{n}"),
            avatar: None,
        },
        created_at: BASE_TIME,
        updated_at: BASE_TIME + Duration::minutes(minutes),
    }
}

#[derive(Default)]
struct FakeState {
    posts: HashMap<Uuid, PostDetail>,
    follows: Vec<FollowEdge>,
    comments: Vec<CommentView>,
    /// Ids returned by the engagement aggregate but missing on hydration.
    vanished: HashSet<Uuid>,
}

/// In-memory primary store with per-query call counters.
#[derive(Default)]
pub struct FakePrimaryStore {
    state: Mutex<FakeState>,
    fail_queries: AtomicBool,
    pub find_post_calls: AtomicUsize,
    pub latest_calls: AtomicUsize,
    pub engagement_calls: AtomicUsize,
    pub by_ids_calls: AtomicUsize,
    pub comment_calls: AtomicUsize,
}

impl FakePrimaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: impl IntoIterator<Item = PostDetail>) -> Self {
        let store = Self::new();
        for post in posts {
            store.upsert(post);
        }
        store
    }

    pub fn upsert(&self, post: PostDetail) {
        self.state
            .lock()
            .expect("state")
            .posts
            .insert(post.id, post);
    }

    pub fn remove(&self, post_id: Uuid) {
        self.state.lock().expect("state").posts.remove(&post_id);
    }

    pub fn update(&self, post_id: Uuid, change: impl FnOnce(&mut PostDetail)) {
        let mut state = self.state.lock().expect("state");
        if let Some(post) = state.posts.get_mut(&post_id) {
            change(post);
        }
    }

    /// Replace the follow edges on `post_id` with `follows` fresh ones, plus
    /// one member-level edge with the same target that must not count.
    pub fn set_follows(&self, post_id: Uuid, follows: i64) {
        let mut state = self.state.lock().expect("state");
        state.follows.retain(|edge| edge.target_id != post_id);
        for n in 0..follows {
            state
                .follows
                .push(FollowEdge::on_post(id(3_000 + n as u128), post_id));
        }
        state.follows.push(FollowEdge {
            member_id: id(4_000),
            target_id: post_id,
            resource_type: ResourceType::Member,
        });
    }

    pub fn set_comment_amount(&self, post_id: Uuid, amount: i64) {
        self.update(post_id, |post| post.comment_amount = amount);
    }

    pub fn add_comment(&self, post_id: Uuid, comment_id: u128, minutes: i64) {
        self.state.lock().expect("state").comments.push(CommentView {
            id: id(comment_id),
            resource: format!("/posts/{post_id}"),
            body: format!("comment {comment_id}"),
            author: AuthorView {
                id: id(2_000 + comment_id),
                nickname: format!("commenter-{comment_id}"),
                avatar: Some("https://example.test/a.png".to_string()),
            },
            created_at: BASE_TIME + Duration::minutes(minutes),
        });
    }

    pub fn vanish_on_hydration(&self, post_id: Uuid) {
        self.state.lock().expect("state").vanished.insert(post_id);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Calls that rebuild a view: the latest listing and the engagement aggregate.
    pub fn resync_queries(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst) + self.engagement_calls.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        for counter in [
            &self.find_post_calls,
            &self.latest_calls,
            &self.engagement_calls,
            &self.by_ids_calls,
            &self.comment_calls,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for FakePrimaryStore {
    async fn find_post(&self, id: Uuid) -> Result<Option<PostDetail>, RepoError> {
        self.find_post_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.state.lock().expect("state").posts.get(&id).cloned())
    }

    async fn list_latest_published(&self, limit: u32) -> Result<Vec<PostDetail>, RepoError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let state = self.state.lock().expect("state");
        let mut posts: Vec<PostDetail> = state
            .posts
            .values()
            .filter(|post| post.is_cache_eligible())
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn list_engagement(&self) -> Result<Vec<EngagementRecord>, RepoError> {
        self.engagement_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let state = self.state.lock().expect("state");
        let follows = post_follow_counts(&state.follows);
        Ok(state
            .posts
            .values()
            .filter(|post| post.is_cache_eligible())
            .map(|post| EngagementRecord {
                post_id: post.id,
                active: post.active,
                status: post.status,
                follow_count: follows.get(&post.id).copied().unwrap_or(0),
                comment_count: post.comment_amount,
            })
            .collect())
    }

    async fn find_posts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PostDetail>, RepoError> {
        self.by_ids_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let state = self.state.lock().expect("state");
        Ok(ids
            .iter()
            .filter(|id| !state.vanished.contains(id))
            .filter_map(|id| state.posts.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl CommentsRepo for FakePrimaryStore {
    async fn list_comments(
        &self,
        filter: &CommentFilter,
        limit: u32,
    ) -> Result<Vec<CommentView>, RepoError> {
        self.comment_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let state = self.state.lock().expect("state");
        let mut comments: Vec<CommentView> = state
            .comments
            .iter()
            .filter(|comment| comment.resource == filter.resource)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        comments.truncate(limit as usize);
        Ok(comments)
    }
}

/// Memory store whose reads or writes can be made to fail.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn key_count(&self) -> usize {
        self.inner.key_count()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("injected read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BackingStore for FailingStore {
    async fn execute(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("injected write failure".to_string()));
        }
        self.inner.execute(batch).await
    }

    async fn execute_if(&self, guard: &FieldGuard, batch: WriteBatch) -> Result<bool, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("injected write failure".to_string()));
        }
        self.inner.execute_if(guard, batch).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check_reads()?;
        self.inner.hash_get_all(key).await
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.check_reads()?;
        self.inner.hash_get(key, field).await
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        self.check_reads()?;
        self.inner.set_members(key).await
    }
}

/// Memory store that yields to the scheduler after every full hash read, so
/// concurrent writers interleave between their read and their write.
#[derive(Default)]
pub struct YieldingStore {
    inner: MemoryStore,
}

impl YieldingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackingStore for YieldingStore {
    async fn execute(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.inner.execute(batch).await
    }

    async fn execute_if(&self, guard: &FieldGuard, batch: WriteBatch) -> Result<bool, StoreError> {
        self.inner.execute_if(guard, batch).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let hash = self.inner.hash_get_all(key).await;
        tokio::task::yield_now().await;
        hash
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.inner.hash_get(key, field).await
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        self.inner.set_members(key).await
    }
}
