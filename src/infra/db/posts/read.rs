use async_trait::async_trait;
use chrono_tz::Tz;
use sqlx::QueryBuilder;
use time::Date;
use tracing::warn;

use crate::application::repos::{PageSlice, PostQueryFilter, PostsRepo, RepoError, SearchHit};
use crate::domain::entities::PostRecord;

use super::super::PostgresRepositories;
use super::types::{PostRow, SearchRow};
use crate::infra::db::map_sqlx_error;

const SIMILARITY_EXPR: &str = "GREATEST(similarity(p.title, $1), similarity(p.body, $1))";

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_published(&mut qb);
        Self::apply_feed_filter(&mut qb, filter);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: PageSlice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let limit = Self::convert_bound(slice.limit, "limit")?;
        let offset = Self::convert_bound(slice.offset, "offset")?;

        let mut qb = QueryBuilder::new("");
        Self::push_post_select(&mut qb);
        qb.push(" WHERE 1=1 ");
        Self::apply_published(&mut qb);
        Self::apply_feed_filter(&mut qb, filter);
        qb.push(" ORDER BY p.publish DESC, p.id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_published_by_date(
        &self,
        slug: &str,
        date: Date,
        tz: Tz,
    ) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new("");
        Self::push_post_select(&mut qb);
        qb.push(" WHERE p.slug = ");
        qb.push_bind(slug);
        qb.push(" AND (p.publish AT TIME ZONE ");
        qb.push_bind(tz.name());
        qb.push(")::date = ");
        qb.push_bind(date);
        Self::apply_published(&mut qb);
        // Uniqueness is enforced on the UTC date, so another timezone can see two rows.
        qb.push(" ORDER BY p.id LIMIT 2");

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if rows.len() > 1 {
            warn!(
                target = "quire::infra::db::posts",
                slug = slug,
                date = %date,
                timezone = tz.name(),
                "several published posts share one address; serving the oldest"
            );
        }

        Ok(rows.into_iter().next().map(PostRecord::from))
    }

    async fn find_published_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new("");
        Self::push_post_select(&mut qb);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);
        Self::apply_published(&mut qb);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn search_similar(
        &self,
        query: &str,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, RepoError> {
        let sql = format!(
            "SELECT {columns}, {SIMILARITY_EXPR} AS similarity \
             FROM posts p INNER JOIN authors a ON a.id = p.author_id \
             WHERE {SIMILARITY_EXPR} > $2 \
             ORDER BY similarity DESC, p.publish DESC, p.id DESC",
            columns = super::super::POST_COLUMNS,
        );

        let rows = sqlx::query_as::<_, SearchRow>(&sql)
            .bind(query)
            .bind(threshold)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                post: PostRecord::from(row.post),
                similarity: row.similarity,
            })
            .collect())
    }
}
