use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use url::{Url, form_urlencoded};

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedFilter, FeedService, PostAddress},
        forms::{CommentForm, EmailPostForm, SearchForm},
        repos::{HealthRepo, RepoError},
        search::{SearchError, SearchService},
        share::{ShareError, ShareService},
    },
    domain::posts,
    presentation::views::{
        DetailTemplate, LayoutChrome, LayoutContext, ListTemplate, PostDetailContext,
        SearchTemplate, ShareContext, ShareTemplate, render_not_found_response,
        render_template_response,
    },
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    public_url::{canonical_url, resolve_base_url},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub share: Arc<ShareService>,
    pub search: Arc<SearchService>,
    pub chrome: LayoutChrome,
    pub health: Arc<dyn HealthRepo>,
    pub public_url: Option<Url>,
}

impl HttpState {
    fn page_chrome(&self, path: &str, title: Option<&str>) -> LayoutChrome {
        let chrome = self
            .chrome
            .clone()
            .with_canonical(canonical_url(self.public_url.as_ref(), path));
        match title {
            Some(title) => chrome.with_title(title),
            None => chrome,
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/tag/{tag_slug}/", get(tag_index))
        .route("/posts/", get(archive))
        .route("/search/", get(search))
        .route("/_health/db", get(public_health))
        .route(
            "/{year}/{month}/{day}/{slug}/",
            get(post_detail).post(post_comment),
        )
        // The post id capture must reuse the `year` name of its sibling route.
        .route("/{year}/share/", get(share_form).post(share_submit))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Last value of `key` in a raw query string, so repeated keys never reject the request.
fn last_query_value(raw: Option<&str>, key: &str) -> Option<String> {
    form_urlencoded::parse(raw?.as_bytes())
        .filter(|(name, _)| name == key)
        .last()
        .map(|(_, value)| value.into_owned())
}

async fn index(State(state): State<HttpState>, RawQuery(query): RawQuery) -> Response {
    let page = last_query_value(query.as_deref(), "page");
    listing_response(&state, FeedFilter::All, page.as_deref()).await
}

async fn tag_index(
    State(state): State<HttpState>,
    Path(tag_slug): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let page = last_query_value(query.as_deref(), "page");
    listing_response(&state, FeedFilter::Tag(tag_slug), page.as_deref()).await
}

async fn listing_response(state: &HttpState, filter: FeedFilter, page: Option<&str>) -> Response {
    let path = filter.base_path();
    match state.feed.listing(filter, page).await {
        Ok(content) => {
            let title = content.tag.as_ref().map(|tag| tag.name.clone());
            let chrome = state.page_chrome(&path, title.as_deref());
            let view = LayoutContext::new(chrome, content);
            render_template_response(ListTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, state.chrome.clone()),
    }
}

async fn archive(State(state): State<HttpState>, RawQuery(query): RawQuery) -> Response {
    let page = last_query_value(query.as_deref(), "page");
    match state.feed.archive(page.as_deref()).await {
        Ok(content) => {
            let view = LayoutContext::new(state.page_chrome("/posts/", Some("Archive")), content);
            render_template_response(ListTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, state.chrome.clone()),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Path((year, month, day, slug)): Path<(String, String, String, String)>,
) -> Response {
    let address = PostAddress {
        year: &year,
        month: &month,
        day: &day,
        slug: &slug,
    };
    match state.feed.post_detail(address).await {
        Ok(content) => render_detail(&state, content),
        Err(err) => feed_error_to_response(err, state.chrome.clone()),
    }
}

async fn post_comment(
    State(state): State<HttpState>,
    Path((year, month, day, slug)): Path<(String, String, String, String)>,
    Form(form): Form<CommentForm>,
) -> Response {
    let address = PostAddress {
        year: &year,
        month: &month,
        day: &day,
        slug: &slug,
    };
    match state.feed.submit_comment(address, &form).await {
        Ok(content) => render_detail(&state, content),
        Err(err) => feed_error_to_response(err, state.chrome.clone()),
    }
}

fn render_detail(state: &HttpState, content: PostDetailContext) -> Response {
    let chrome = state.page_chrome(&content.post.href, Some(&content.post.title));
    let view = LayoutContext::new(chrome, content);
    render_template_response(DetailTemplate { view }, StatusCode::OK)
}

async fn share_form(State(state): State<HttpState>, Path(raw_id): Path<String>) -> Response {
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(state.chrome.clone());
    };
    match state.share.load(post_id).await {
        Ok(content) => render_share(&state, content),
        Err(err) => share_error_to_response(err, state.chrome.clone()),
    }
}

async fn share_submit(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<EmailPostForm>,
) -> Response {
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(state.chrome.clone());
    };
    let base = resolve_base_url(state.public_url.as_ref(), &headers);
    match state.share.share(post_id, &form, base.as_ref()).await {
        Ok(content) => render_share(&state, content),
        Err(err) => share_error_to_response(err, state.chrome.clone()),
    }
}

fn render_share(state: &HttpState, content: ShareContext) -> Response {
    let path = posts::share_path(content.post.id);
    let title = format!("Share \"{}\"", content.post.title);
    let view = LayoutContext::new(state.page_chrome(&path, Some(&title)), content);
    render_template_response(ShareTemplate { view }, StatusCode::OK)
}

/// Post ids in URLs are unsigned decimal integers.
fn parse_post_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

async fn search(State(state): State<HttpState>, RawQuery(query): RawQuery) -> Response {
    let form = SearchForm {
        query: last_query_value(query.as_deref(), "query"),
    };
    match state.search.search(&form).await {
        Ok(content) => {
            let view = LayoutContext::new(state.page_chrome("/search/", Some("Search")), content);
            render_template_response(SearchTemplate { view }, StatusCode::OK)
        }
        Err(SearchError::Repo(err)) => repo_error_to_response(
            "infra::http::search_error_to_response",
            err,
            state.chrome.clone(),
        ),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(state.chrome.clone())
}

fn not_found_with_detail(chrome: LayoutChrome, source: &'static str, detail: String) -> Response {
    let mut response = render_not_found_response(chrome);
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, detail).attach(&mut response);
    response
}

/// Repository failures on public pages: a vanished row is a 404, a timeout is
/// a 503 and everything else is a 500.
fn repo_error_to_response(source: &'static str, err: RepoError, chrome: LayoutChrome) -> Response {
    match err {
        RepoError::NotFound => not_found_with_detail(chrome, source, err.to_string()),
        RepoError::Timeout => HttpError::from_error(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
            &err,
        )
        .into_response(),
        err => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

fn feed_error_to_response(err: FeedError, chrome: LayoutChrome) -> Response {
    const SOURCE: &str = "infra::http::feed_error_to_response";
    match err {
        FeedError::UnknownTag | FeedError::UnknownPost | FeedError::InvalidPage(_) => {
            not_found_with_detail(chrome, SOURCE, err.to_string())
        }
        FeedError::Repo(err) => repo_error_to_response(SOURCE, err, chrome),
    }
}

fn share_error_to_response(err: ShareError, chrome: LayoutChrome) -> Response {
    const SOURCE: &str = "infra::http::share_error_to_response";
    match err {
        ShareError::UnknownPost => not_found_with_detail(chrome, SOURCE, err.to_string()),
        ShareError::Repo(err) => repo_error_to_response(SOURCE, err, chrome),
        ShareError::MissingPublicUrl => HttpError::new(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Cannot determine public URL",
            "Neither site.public_url nor a Host header is available",
        )
        .into_response(),
        ShareError::InvalidPostUrl(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Cannot determine public URL",
            &err,
        )
        .into_response(),
        ShareError::Mail(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Email could not be sent",
            &err,
        )
        .into_response(),
    }
}
