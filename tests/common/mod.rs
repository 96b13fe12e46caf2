#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono_tz::Tz;
use http_body_util::BodyExt;
use time::{Date, OffsetDateTime};
use tower::ServiceExt;
use url::Url;

use quire::application::feed::FeedService;
use quire::application::mail::{MailError, Mailer, OutgoingEmail};
use quire::application::repos::{
    CommentsRepo, CreateCommentParams, HealthRepo, PageSlice, PostQueryFilter, PostsRepo,
    RepoError, SearchHit, TagsRepo,
};
use quire::application::search::SearchService;
use quire::application::share::{DEFAULT_FROM_ADDRESS, ShareService};
use quire::domain::entities::{CommentRecord, PostRecord, TagRecord};
use quire::domain::posts;
use quire::domain::types::PostStatus;
use quire::infra::http::{HttpState, build_router};
use quire::presentation::views::LayoutChrome;

/// In-memory stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryBlog {
    posts: Mutex<Vec<PostRecord>>,
    tags: Mutex<Vec<TagRecord>>,
    post_tags: Mutex<Vec<(i64, i64)>>,
    comments: Mutex<Vec<CommentRecord>>,
    next_id: AtomicUsize,
    comment_failure: Mutex<Option<RepoError>>,
    search_failure: Mutex<Option<RepoError>>,
}

impl MemoryBlog {
    fn next_id(&self) -> i64 {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1) as i64
    }

    pub fn add_post(
        &self,
        title: &str,
        slug: &str,
        body: &str,
        publish: OffsetDateTime,
        status: PostStatus,
    ) -> i64 {
        let id = self.next_id();
        self.posts.lock().expect("posts lock").push(PostRecord {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            body: body.to_string(),
            publish,
            created: publish,
            updated: publish,
            status,
            author_id: 1,
            author: "admin".to_string(),
        });
        id
    }

    pub fn add_tag(&self, slug: &str, name: &str) -> i64 {
        let id = self.next_id();
        self.tags.lock().expect("tags lock").push(TagRecord {
            id,
            slug: slug.to_string(),
            name: name.to_string(),
        });
        id
    }

    pub fn tag_post(&self, post_id: i64, tag_id: i64) {
        self.post_tags
            .lock()
            .expect("post tags lock")
            .push((post_id, tag_id));
    }

    pub fn add_comment(&self, post_id: i64, name: &str, body: &str, active: bool) -> i64 {
        let id = self.next_id();
        let now = OffsetDateTime::now_utc();
        self.comments
            .lock()
            .expect("comments lock")
            .push(CommentRecord {
                id,
                post_id,
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                body: body.to_string(),
                created: now,
                updated: now,
                active,
            });
        id
    }

    /// The next `create_comment` call fails with `error`.
    pub fn fail_next_comment(&self, error: RepoError) {
        *self.comment_failure.lock().expect("failure lock") = Some(error);
    }

    /// The next `search_similar` call fails with `error`.
    pub fn fail_next_search(&self, error: RepoError) {
        *self.search_failure.lock().expect("failure lock") = Some(error);
    }

    pub fn active_comment_count(&self, post_id: i64) -> usize {
        self.comments
            .lock()
            .expect("comments lock")
            .iter()
            .filter(|comment| comment.post_id == post_id && comment.active)
            .count()
    }

    fn tag_id(&self, slug: &str) -> Option<i64> {
        self.tags
            .lock()
            .expect("tags lock")
            .iter()
            .find(|tag| tag.slug == slug)
            .map(|tag| tag.id)
    }

    fn published(&self, filter: &PostQueryFilter) -> Vec<PostRecord> {
        let tag_id = filter.tag.as_deref().map(|slug| self.tag_id(slug));
        let links = self.post_tags.lock().expect("post tags lock").clone();
        let mut posts: Vec<PostRecord> = self
            .posts
            .lock()
            .expect("posts lock")
            .iter()
            .filter(|post| post.is_published())
            .filter(|post| match tag_id {
                None => true,
                Some(None) => false,
                Some(Some(tag_id)) => links.contains(&(post.id, tag_id)),
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.publish.cmp(&a.publish).then(b.id.cmp(&a.id)));
        posts
    }
}

#[async_trait]
impl PostsRepo for MemoryBlog {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        Ok(self.published(filter).len() as u64)
    }

    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: PageSlice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self
            .published(filter)
            .into_iter()
            .skip(slice.offset as usize)
            .take(slice.limit as usize)
            .collect())
    }

    async fn find_published_by_date(
        &self,
        slug: &str,
        date: Date,
        tz: Tz,
    ) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .published(&PostQueryFilter::default())
            .into_iter()
            .find(|post| post.slug == slug && posts::local_publish_date(post.publish, tz) == date))
    }

    async fn find_published_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .published(&PostQueryFilter::default())
            .into_iter()
            .find(|post| post.id == id))
    }

    async fn search_similar(
        &self,
        query: &str,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, RepoError> {
        if let Some(error) = self.search_failure.lock().expect("failure lock").take() {
            return Err(error);
        }
        let mut hits: Vec<SearchHit> = self
            .posts
            .lock()
            .expect("posts lock")
            .iter()
            .map(|post| SearchHit {
                similarity: trigram_similarity(&post.title, query)
                    .max(trigram_similarity(&post.body, query)),
                post: post.clone(),
            })
            .filter(|hit| hit.similarity > threshold)
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(b.post.publish.cmp(&a.post.publish))
        });
        Ok(hits)
    }
}

#[async_trait]
impl TagsRepo for MemoryBlog {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        Ok(self
            .tags
            .lock()
            .expect("tags lock")
            .iter()
            .find(|tag| tag.slug == slug)
            .cloned())
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<TagRecord>, RepoError> {
        let links = self.post_tags.lock().expect("post tags lock").clone();
        Ok(self
            .tags
            .lock()
            .expect("tags lock")
            .iter()
            .filter(|tag| links.contains(&(post_id, tag.id)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CommentsRepo for MemoryBlog {
    async fn list_active(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        Ok(self
            .comments
            .lock()
            .expect("comments lock")
            .iter()
            .filter(|comment| comment.post_id == post_id && comment.active)
            .cloned()
            .collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        if let Some(error) = self.comment_failure.lock().expect("failure lock").take() {
            return Err(error);
        }
        let now = OffsetDateTime::now_utc();
        let record = CommentRecord {
            id: self.next_id(),
            post_id: params.post_id,
            name: params.name,
            email: params.email,
            body: params.body,
            created: now,
            updated: now,
            active: true,
        };
        self.comments
            .lock()
            .expect("comments lock")
            .push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl HealthRepo for MemoryBlog {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Word-padded trigram similarity in the manner of `pg_trgm`.
pub fn trigram_similarity(left: &str, right: &str) -> f32 {
    let left = trigrams(left);
    let right = trigrams(right);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.len() + right.len() - shared;
    shared as f32 / union as f32
}

fn trigrams(text: &str) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        let padded: Vec<char> = format!("  {} ", word.to_lowercase()).chars().collect();
        for window in padded.windows(3) {
            set.insert(window.iter().collect());
        }
    }
    set
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().expect("mailer lock").push(email.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FailingMailer {
    attempts: AtomicUsize,
}

impl FailingMailer {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<(), MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MailError::Transport("connection refused".to_string()))
    }
}

pub struct TestApp {
    pub blog: Arc<MemoryBlog>,
    pub router: Router,
}

pub fn app(blog: Arc<MemoryBlog>, mailer: Arc<dyn Mailer>) -> TestApp {
    app_with(blog, mailer, chrono_tz::UTC, None)
}

pub fn app_with(
    blog: Arc<MemoryBlog>,
    mailer: Arc<dyn Mailer>,
    timezone: Tz,
    public_url: Option<Url>,
) -> TestApp {
    let posts: Arc<dyn PostsRepo> = blog.clone();
    let tags: Arc<dyn TagsRepo> = blog.clone();
    let comments: Arc<dyn CommentsRepo> = blog.clone();
    let health: Arc<dyn HealthRepo> = blog.clone();

    let state = HttpState {
        feed: Arc::new(FeedService::new(posts.clone(), tags, comments, timezone)),
        share: Arc::new(ShareService::new(
            posts.clone(),
            mailer,
            DEFAULT_FROM_ADDRESS,
            timezone,
        )),
        search: Arc::new(SearchService::new(posts, timezone)),
        chrome: LayoutChrome::new("My Blog", "This is my blog."),
        health,
        public_url,
    };

    TestApp {
        blog,
        router: build_router(state),
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let body = String::from_utf8(bytes.to_vec()).expect("body should be utf-8");
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.send(get(uri)).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> (StatusCode, String) {
        self.send(post_form(uri, form)).await
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

pub fn post_form(uri: &str, form: &str) -> Request<Body> {
    form_request(uri)
        .body(Body::from(form.to_string()))
        .expect("request should build")
}

/// Form POST builder so callers can add headers before attaching the body.
pub fn form_request(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
}

/// Position of `needle` in `haystack`, failing the test when absent.
pub fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("expected `{needle}` in response"))
}
