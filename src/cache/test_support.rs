use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{CommentFilter, CommentsRepo, PostsRepo, RepoError};
use crate::domain::entities::{CommentView, EngagementRecord, PostDetail};

/// Primary store with no rows at all.
pub(crate) struct EmptyRepo;

#[async_trait]
impl PostsRepo for EmptyRepo {
    async fn find_post(&self, _id: Uuid) -> Result<Option<PostDetail>, RepoError> {
        Ok(None)
    }

    async fn list_latest_published(&self, _limit: u32) -> Result<Vec<PostDetail>, RepoError> {
        Ok(Vec::new())
    }

    async fn list_engagement(&self) -> Result<Vec<EngagementRecord>, RepoError> {
        Ok(Vec::new())
    }

    async fn find_posts_by_ids(&self, _ids: &[Uuid]) -> Result<Vec<PostDetail>, RepoError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl CommentsRepo for EmptyRepo {
    async fn list_comments(
        &self,
        _filter: &CommentFilter,
        _limit: u32,
    ) -> Result<Vec<CommentView>, RepoError> {
        Ok(Vec::new())
    }
}
