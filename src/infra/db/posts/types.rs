use time::OffsetDateTime;

use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) slug: String,
    pub(crate) body: String,
    pub(crate) publish: OffsetDateTime,
    pub(crate) created: OffsetDateTime,
    pub(crate) updated: OffsetDateTime,
    pub(crate) status: PostStatus,
    pub(crate) author_id: i64,
    pub(crate) author: String,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            body: row.body,
            publish: row.publish,
            created: row.created,
            updated: row.updated,
            status: row.status,
            author_id: row.author_id,
            author: row.author,
        }
    }
}

/// A post row plus its best title/body similarity to the search query.
#[derive(sqlx::FromRow)]
pub(crate) struct SearchRow {
    #[sqlx(flatten)]
    pub(crate) post: PostRow,
    pub(crate) similarity: f32,
}
