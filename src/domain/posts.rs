//! Post mutation payloads as seen by the cache subsystem.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::types::PublishStatus;

/// Fields touched by a single post update.
///
/// `active` and `status` are `Some` only when the update payload carried them;
/// either one being present makes the update structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostUpdate {
    pub post_id: Uuid,
    pub active: Option<bool>,
    pub status: Option<PublishStatus>,
}

impl PostUpdate {
    /// An update that only changed cosmetic fields (title, body, tags...).
    pub fn cosmetic(post_id: Uuid) -> Self {
        Self {
            post_id,
            active: None,
            status: None,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn with_status(mut self, status: PublishStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether view membership or ranking may have changed.
    pub fn is_structural(&self) -> bool {
        self.active.is_some() || self.status.is_some()
    }
}

/// A bulk update applied to a set of posts at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkStatusUpdate {
    pub post_ids: HashSet<Uuid>,
    pub active: Option<bool>,
    pub status: Option<PublishStatus>,
}

impl BulkStatusUpdate {
    pub fn new(post_ids: impl IntoIterator<Item = Uuid>) -> Result<Self, DomainError> {
        let post_ids: HashSet<Uuid> = post_ids.into_iter().collect();
        if post_ids.is_empty() {
            return Err(DomainError::EmptyBulkUpdate);
        }
        Ok(Self {
            post_ids,
            active: None,
            status: None,
        })
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn with_status(mut self, status: PublishStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_structural(&self) -> bool {
        self.active.is_some() || self.status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosmetic_update_is_not_structural() {
        assert!(!PostUpdate::cosmetic(Uuid::nil()).is_structural());
    }

    #[test]
    fn status_or_active_makes_update_structural() {
        let id = Uuid::new_v4();
        assert!(PostUpdate::cosmetic(id).with_active(false).is_structural());
        assert!(
            PostUpdate::cosmetic(id)
                .with_status(PublishStatus::Draft)
                .is_structural()
        );
    }

    #[test]
    fn bulk_update_rejects_empty_ids() {
        let err = BulkStatusUpdate::new(Vec::new()).expect_err("empty bulk");
        assert_eq!(err, DomainError::EmptyBulkUpdate);
    }
}
