//! Builds denormalized cache entries from the primary store.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::application::repos::{CommentFilter, CommentsRepo, PostsRepo, RepoError};
use crate::domain::entities::{CacheEntry, PostDetail};
use crate::domain::error::DomainError;

pub const DEFAULT_HEAD_COMMENT_LIMIT: u32 = 2;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("failed to load post {post_id}: {source}")]
    Post {
        post_id: Uuid,
        #[source]
        source: RepoError,
    },
    #[error("failed to load comments for post {post_id}: {source}")]
    Comments {
        post_id: Uuid,
        #[source]
        source: RepoError,
    },
}

/// Joins a post with its author and newest comments into one [`CacheEntry`].
#[derive(Clone)]
pub struct AssemblyService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    head_comment_limit: u32,
}

impl AssemblyService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self {
            posts,
            comments,
            head_comment_limit: DEFAULT_HEAD_COMMENT_LIMIT,
        }
    }

    pub fn with_head_comment_limit(mut self, limit: u32) -> Self {
        self.head_comment_limit = limit;
        self
    }

    /// Load the post and its head comments; no entry is produced on any failure.
    #[instrument(skip(self))]
    pub async fn assemble(&self, post_id: Uuid) -> Result<CacheEntry, AssemblyError> {
        let post = self
            .posts
            .find_post(post_id)
            .await
            .map_err(|source| AssemblyError::Post { post_id, source })?
            .ok_or(DomainError::PostNotFound { post_id })?;

        self.with_head_comments(post).await
    }

    /// Attach head comments to an already loaded post.
    pub async fn with_head_comments(&self, post: PostDetail) -> Result<CacheEntry, AssemblyError> {
        if self.head_comment_limit == 0 {
            return Ok(CacheEntry::new(post));
        }

        let post_id = post.id;
        let comments = self
            .comments
            .list_comments(&CommentFilter::for_post(post_id), self.head_comment_limit)
            .await
            .map_err(|source| AssemblyError::Comments { post_id, source })?;

        Ok(CacheEntry::new(post).with_comments(comments))
    }
}
