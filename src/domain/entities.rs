//! Domain entities mirrored from persistent storage and the cache.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{PublishStatus, ResourceType};

/// Author display fields denormalized into cached posts and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorView {
    pub id: Uuid,
    pub nickname: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: Uuid,
    pub name: String,
}

/// A post joined with its author, tags and project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub active: bool,
    pub status: PublishStatus,
    pub comment_amount: i64,
    pub tags: Vec<String>,
    pub project: Option<ProjectRef>,
    pub author: AuthorView,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl PostDetail {
    /// Only active, published posts may appear in a ranked view.
    pub fn is_cache_eligible(&self) -> bool {
        is_cache_eligible(self.active, self.status)
    }
}

pub fn is_cache_eligible(active: bool, status: PublishStatus) -> bool {
    active && status == PublishStatus::Published
}

/// Score inputs for one post, as returned by the engagement aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementRecord {
    pub post_id: Uuid,
    pub active: bool,
    pub status: PublishStatus,
    pub follow_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FollowEdge {
    pub member_id: Uuid,
    pub target_id: Uuid,
    pub resource_type: ResourceType,
}

impl FollowEdge {
    pub fn on_post(member_id: Uuid, post_id: Uuid) -> Self {
        Self {
            member_id,
            target_id: post_id,
            resource_type: ResourceType::Post,
        }
    }
}

/// Follow count per post id. Edges on members or projects are ignored.
pub fn post_follow_counts<'a>(
    edges: impl IntoIterator<Item = &'a FollowEdge>,
) -> HashMap<Uuid, i64> {
    let mut counts = HashMap::new();
    for edge in edges {
        if edge.resource_type == ResourceType::Post {
            *counts.entry(edge.target_id).or_insert(0) += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub resource: String,
    pub body: String,
    pub author: AuthorView,
    pub created_at: OffsetDateTime,
}

/// Immutable snapshot written into a view slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub post: PostDetail,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CommentView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl CacheEntry {
    pub fn new(post: PostDetail) -> Self {
        Self {
            post,
            comments: Vec::new(),
            score: None,
        }
    }

    pub fn with_comments(mut self, comments: Vec<CommentView>) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn post_id(&self) -> Uuid {
        self.post.id
    }
}
