use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("post {post_id} not found")]
    PostNotFound { post_id: Uuid },
    #[error("bulk update names no posts")]
    EmptyBulkUpdate,
}
