use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::{AuthorView, EngagementRecord, PostDetail, ProjectRef};
use crate::domain::types::{PublishStatus, ResourceType};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(crate) struct PostDetailRow {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) excerpt: String,
    pub(crate) active: bool,
    pub(crate) status: PublishStatus,
    pub(crate) comment_amount: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
    pub(crate) author_id: Uuid,
    pub(crate) author_nickname: String,
    pub(crate) author_avatar: Option<String>,
    pub(crate) project_id: Option<Uuid>,
    pub(crate) project_name: Option<String>,
    pub(crate) tags: Vec<String>,
}

impl From<PostDetailRow> for PostDetail {
    fn from(row: PostDetailRow) -> Self {
        let project = match (row.project_id, row.project_name) {
            (Some(id), Some(name)) => Some(ProjectRef { id, name }),
            _ => None,
        };

        Self {
            id: row.id,
            title: row.title,
            excerpt: row.excerpt,
            active: row.active,
            status: row.status,
            comment_amount: row.comment_amount,
            tags: row.tags,
            project,
            author: AuthorView {
                id: row.author_id,
                nickname: row.author_nickname,
                avatar: row.author_avatar,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EngagementRow {
    pub(crate) post_id: Uuid,
    pub(crate) active: bool,
    pub(crate) status: PublishStatus,
    pub(crate) follow_count: i64,
    pub(crate) comment_count: i64,
}

impl From<EngagementRow> for EngagementRecord {
    fn from(row: EngagementRow) -> Self {
        Self {
            post_id: row.post_id,
            active: row.active,
            status: row.status,
            follow_count: row.follow_count,
            comment_count: row.comment_count,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    #[instrument(skip(self))]
    async fn find_post(&self, id: Uuid) -> Result<Option<PostDetail>, RepoError> {
        let mut qb = Self::post_detail_query();
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostDetailRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostDetail::from))
    }

    #[instrument(skip(self))]
    async fn list_latest_published(&self, limit: u32) -> Result<Vec<PostDetail>, RepoError> {
        let mut qb = Self::post_detail_query();
        qb.push(" WHERE p.active = TRUE AND p.status = ");
        qb.push_bind(PublishStatus::Published);
        qb.push(" ORDER BY p.updated_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<PostDetailRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostDetail::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_engagement(&self) -> Result<Vec<EngagementRecord>, RepoError> {
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "SELECT p.id AS post_id, p.active, p.status, \
             COALESCE(f.follow_count, 0) AS follow_count, \
             p.comment_amount::bigint AS comment_count \
             FROM posts p \
             LEFT JOIN (SELECT target_id, COUNT(*) AS follow_count FROM follows \
                        WHERE resource_type = ",
        );
        qb.push_bind(ResourceType::Post.as_str());
        qb.push(" GROUP BY target_id) f ON f.target_id = p.id ");
        qb.push(" WHERE p.active = TRUE AND p.status = ");
        qb.push_bind(PublishStatus::Published);

        let rows = qb
            .build_query_as::<EngagementRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(EngagementRecord::from).collect())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_posts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PostDetail>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = Self::post_detail_query();
        qb.push(" WHERE p.id = ANY(");
        qb.push_bind(ids.to_vec());
        qb.push(")");

        let rows = qb
            .build_query_as::<PostDetailRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostDetail::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn detail_row() -> PostDetailRow {
        PostDetailRow {
            id: Uuid::from_u128(1),
            title: "title".to_string(),
            excerpt: "excerpt".to_string(),
            active: true,
            status: PublishStatus::Published,
            comment_amount: 4,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-02 00:00 UTC),
            author_id: Uuid::from_u128(10),
            author_nickname: "ada".to_string(),
            author_avatar: None,
            project_id: None,
            project_name: None,
            tags: vec!["rust".to_string()],
        }
    }

    #[test]
    fn detail_row_without_project_maps_to_none() {
        let detail = PostDetail::from(detail_row());
        assert!(detail.project.is_none());
        assert_eq!(detail.author.nickname, "ada");
        assert_eq!(detail.tags, vec!["rust".to_string()]);
        assert!(detail.is_cache_eligible());
    }

    #[test]
    fn detail_row_with_project_maps_reference() {
        let mut row = detail_row();
        row.project_id = Some(Uuid::from_u128(20));
        row.project_name = Some("compiler".to_string());

        let detail = PostDetail::from(row);
        assert_eq!(
            detail.project,
            Some(ProjectRef {
                id: Uuid::from_u128(20),
                name: "compiler".to_string()
            })
        );
    }
}
