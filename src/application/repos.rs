//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use chrono_tz::Tz;
use thiserror::Error;
use time::Date;

use crate::domain::entities::{CommentRecord, PostRecord, TagRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostQueryFilter {
    /// Restrict to posts carrying the tag with this slug.
    pub tag: Option<String>,
}

/// Offset window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSlice {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub post: PostRecord,
    pub similarity: f32,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError>;

    /// Published posts ordered by `publish DESC, id DESC`.
    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: PageSlice,
    ) -> Result<Vec<PostRecord>, RepoError>;

    /// Published post whose slug matches and whose publish date, observed in
    /// `tz`, equals `date`.
    async fn find_published_by_date(
        &self,
        slug: &str,
        date: Date,
        tz: Tz,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn find_published_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;

    /// Posts of any status whose best title/body trigram similarity exceeds
    /// `threshold`, most similar first.
    async fn search_similar(
        &self,
        query: &str,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<TagRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Active comments for a post, oldest first.
    async fn list_active(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
