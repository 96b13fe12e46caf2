//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::PostStatus;

/// A post row joined with its author's username.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub publish: OffsetDateTime,
    pub created: OffsetDateTime,
    pub updated: OffsetDateTime,
    pub status: PostStatus,
    pub author_id: i64,
    pub author: String,
}

impl PostRecord {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
    pub created: OffsetDateTime,
    pub updated: OffsetDateTime,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub id: i64,
    pub slug: String,
    pub name: String,
}
