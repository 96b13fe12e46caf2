//! Postgres-backed repository implementations.

mod comments;
mod posts;
mod tags;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{HealthRepo, PostQueryFilter, RepoError};
use crate::domain::types::PostStatus;

const POST_COLUMNS: &str = "p.id, p.title, p.slug, p.body, p.publish, p.created, p.updated, \
     p.status, p.author_id, a.username AS author";

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

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    fn push_post_select<'q>(qb: &mut QueryBuilder<'q, Postgres>) {
        qb.push("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM posts p INNER JOIN authors a ON a.id = p.author_id ");
    }

    fn apply_published<'q>(qb: &mut QueryBuilder<'q, Postgres>) {
        qb.push(" AND p.status = ");
        qb.push_bind(PostStatus::Published);
    }

    fn apply_feed_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PostQueryFilter) {
        if let Some(tag) = filter.tag.as_ref() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id WHERE pt.post_id = p.id AND t.slug = ",
            );
            qb.push_bind(tag);
            qb.push(")");
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }

    fn convert_bound(value: u64, field: &str) -> Result<i64, RepoError> {
        i64::try_from(value).map_err(|_| RepoError::InvalidInput {
            message: format!("{field} {value} exceeds supported range"),
        })
    }
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
