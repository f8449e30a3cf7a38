use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::application::repos::{CommentFilter, CommentsRepo, RepoError};
use crate::domain::entities::{AuthorView, CommentView};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub(crate) id: Uuid,
    pub(crate) resource: String,
    pub(crate) body: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) author_id: Uuid,
    pub(crate) author_nickname: String,
    pub(crate) author_avatar: Option<String>,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            resource: row.resource,
            body: row.body,
            author: AuthorView {
                id: row.author_id,
                nickname: row.author_nickname,
                avatar: row.author_avatar,
            },
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    #[instrument(skip(self, filter), fields(resource = %filter.resource))]
    async fn list_comments(
        &self,
        filter: &CommentFilter,
        limit: u32,
    ) -> Result<Vec<CommentView>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT c.id, c.resource, c.body, c.created_at, \
             m.id AS author_id, m.nickname AS author_nickname, m.avatar AS author_avatar \
             FROM comments c \
             INNER JOIN members m ON m.id = c.author_id \
             WHERE c.resource = $1 \
             ORDER BY c.created_at DESC, c.id DESC \
             LIMIT $2",
        )
        .bind(&filter.resource)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentView::from).collect())
    }
}
