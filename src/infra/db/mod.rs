//! Postgres-backed repository implementations.
//!
//! The queries assume a minimal schema: `posts`, `members` (authors), `projects`,
//! `tags`/`post_tags`, `follows` and `comments`.

mod comments;
mod posts;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

/// Columns of a fully joined post, shared by every detail query.
const POST_DETAIL_SELECT: &str = "SELECT p.id, p.title, p.excerpt, p.active, p.status, \
     p.comment_amount::bigint AS comment_amount, p.created_at, p.updated_at, \
     m.id AS author_id, m.nickname AS author_nickname, m.avatar AS author_avatar, \
     pr.id AS project_id, pr.name AS project_name, \
     ARRAY(SELECT t.name FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id \
           WHERE pt.post_id = p.id ORDER BY t.name) AS tags \
     FROM posts p \
     INNER JOIN members m ON m.id = p.author_id \
     LEFT JOIN projects pr ON pr.id = p.project_id ";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn post_detail_query<'q>() -> QueryBuilder<'q, Postgres> {
        QueryBuilder::new(POST_DETAIL_SELECT)
    }
}
