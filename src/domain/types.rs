//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

/// Workflow state of a post (mirrors Postgres enum `publish_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "publish_status", rename_all = "snake_case")]
pub enum PublishStatus {
    Draft,
    Scheduled,
    Published,
    Archived,
}

/// Kind of resource a follow edge points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Post,
    Member,
    Project,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Post => "post",
            ResourceType::Member => "member",
            ResourceType::Project => "project",
        }
    }
}
