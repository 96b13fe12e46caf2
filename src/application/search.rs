use std::sync::Arc;

use chrono_tz::Tz;
use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::application::feed::post_href;
use crate::application::forms::SearchForm;
use crate::application::repos::{PostsRepo, RepoError, SearchHit};
use crate::domain::posts;
use crate::presentation::views::{SearchContext, SearchResultView};

/// Minimum trigram similarity a post needs to be listed.
pub const SIMILARITY_THRESHOLD: f32 = 0.3;
pub const METRIC_SEARCH_QUERIES: &str = "quire_search_queries_total";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct SearchService {
    posts: Arc<dyn PostsRepo>,
    timezone: Tz,
}

impl SearchService {
    pub fn new(posts: Arc<dyn PostsRepo>, timezone: Tz) -> Self {
        Self { posts, timezone }
    }

    pub async fn search(&self, form: &SearchForm) -> Result<SearchContext, SearchError> {
        let mut context = SearchContext {
            query: form.raw_query().to_string(),
            submitted: form.is_submitted(),
            errors: Default::default(),
            results: Vec::new(),
        };

        if !form.is_submitted() {
            return Ok(context);
        }

        let query = match form.validate() {
            Ok(query) => query,
            Err(errors) => {
                context.errors = errors;
                return Ok(context);
            }
        };

        let hits = self
            .posts
            .search_similar(query.as_str(), SIMILARITY_THRESHOLD)
            .await?;

        counter!(METRIC_SEARCH_QUERIES).increment(1);
        info!(
            target = "quire::application::search",
            query = query.as_str(),
            hits = hits.len(),
            "search executed"
        );

        context.query = query.as_str().to_string();
        context.results = hits.iter().map(|hit| self.result_view(hit)).collect();
        Ok(context)
    }

    fn result_view(&self, hit: &SearchHit) -> SearchResultView {
        SearchResultView {
            title: hit.post.title.clone(),
            href: post_href(&hit.post, self.timezone),
            published_on: posts::format_human_datetime(hit.post.publish, self.timezone),
            excerpt: posts::truncate_words(&hit.post.body, posts::EXCERPT_WORDS),
            similarity: format!("{:.2}", hit.similarity),
        }
    }
}
