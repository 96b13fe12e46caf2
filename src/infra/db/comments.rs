use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CommentsRepo, CreateCommentParams, RepoError},
    domain::entities::CommentRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    name: String,
    email: String,
    body: String,
    created: OffsetDateTime,
    updated: OffsetDateTime,
    active: bool,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            name: row.name,
            email: row.email,
            body: row.body,
            created: row.created,
            updated: row.updated,
            active: row.active,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_active(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, post_id, name, email, body, created, updated, active
            FROM comments
            WHERE post_id = $1 AND active
            ORDER BY created ASC, id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (post_id, name, email, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, name, email, body, created, updated, active
            "#,
        )
        .bind(params.post_id)
        .bind(&params.name)
        .bind(&params.email)
        .bind(&params.body)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CommentRecord::from(row))
    }
}
