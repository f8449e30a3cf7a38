//! Repository traits describing the primary-store adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{CommentView, EngagementRecord, PostDetail};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Selects the comments attached to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentFilter {
    pub resource: String,
}

impl CommentFilter {
    pub fn for_post(post_id: Uuid) -> Self {
        Self {
            resource: format!("/posts/{post_id}"),
        }
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Fully joined post (author, tags, project), regardless of eligibility.
    async fn find_post(&self, id: Uuid) -> Result<Option<PostDetail>, RepoError>;

    /// Top `limit` active+published posts, `updated_at DESC, id DESC`.
    async fn list_latest_published(&self, limit: u32) -> Result<Vec<PostDetail>, RepoError>;

    /// Active+published posts with their follow count (0 when unfollowed).
    async fn list_engagement(&self) -> Result<Vec<EngagementRecord>, RepoError>;

    /// Fully joined rows for an explicit id set; order is unspecified.
    async fn find_posts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PostDetail>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments for the filtered resource, newest first.
    async fn list_comments(
        &self,
        filter: &CommentFilter,
        limit: u32,
    ) -> Result<Vec<CommentView>, RepoError>;
}
