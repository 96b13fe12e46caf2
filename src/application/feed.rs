use std::sync::Arc;

use chrono_tz::Tz;
use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::application::forms::CommentForm;
use crate::application::pagination::{Page, PageWindow, PaginationError, Paginator};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, PostQueryFilter, PostsRepo, RepoError, TagsRepo,
};
use crate::domain::entities::{CommentRecord, PostRecord, TagRecord};
use crate::domain::posts;
use crate::presentation::views::{
    CommentFormView, CommentView, ListingContext, PaginationView, PostCard, PostDetailContext,
    PostView, TagView,
};

pub const POSTS_PER_PAGE: u64 = 3;
pub const METRIC_COMMENTS_CREATED: &str = "quire_comments_created_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFilter {
    All,
    Tag(String),
}

impl FeedFilter {
    pub fn base_path(&self) -> String {
        match self {
            FeedFilter::All => "/".to_string(),
            FeedFilter::Tag(slug) => posts::tag_path(slug),
        }
    }
}

/// Date and slug segments of a post URL, unparsed.
#[derive(Debug, Clone, Copy)]
pub struct PostAddress<'a> {
    pub year: &'a str,
    pub month: &'a str,
    pub day: &'a str,
    pub slug: &'a str,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown tag")]
    UnknownTag,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    InvalidPage(#[from] PaginationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    tags: Arc<dyn TagsRepo>,
    comments: Arc<dyn CommentsRepo>,
    timezone: Tz,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        tags: Arc<dyn TagsRepo>,
        comments: Arc<dyn CommentsRepo>,
        timezone: Tz,
    ) -> Self {
        Self {
            posts,
            tags,
            comments,
            timezone,
        }
    }

    /// Listing with the lenient page policy, optionally restricted to a tag.
    pub async fn listing(
        &self,
        filter: FeedFilter,
        raw_page: Option<&str>,
    ) -> Result<ListingContext, FeedError> {
        let (tag, query_filter) = match &filter {
            FeedFilter::All => (None, PostQueryFilter::default()),
            FeedFilter::Tag(slug) => {
                let tag = self
                    .tags
                    .find_by_slug(slug)
                    .await?
                    .ok_or(FeedError::UnknownTag)?;
                let query_filter = PostQueryFilter {
                    tag: Some(tag.slug.clone()),
                };
                (Some(tag), query_filter)
            }
        };

        let total = self.posts.count_published(&query_filter).await?;
        let window = Paginator::new(total, POSTS_PER_PAGE).page_lenient(raw_page);
        let page = self.load_page(&query_filter, window).await?;

        let heading = match &tag {
            Some(tag) => format!("Posts tagged with \"{}\"", tag.name),
            None => "Latest posts".to_string(),
        };

        Ok(ListingContext {
            heading,
            pagination: PaginationView::new(&page.window, &filter.base_path()),
            posts: page.items,
            tag: tag.as_ref().map(tag_view),
        })
    }

    /// Listing of every published post with the strict page policy.
    pub async fn archive(&self, raw_page: Option<&str>) -> Result<ListingContext, FeedError> {
        let query_filter = PostQueryFilter::default();
        let total = self.posts.count_published(&query_filter).await?;
        let window = Paginator::new(total, POSTS_PER_PAGE).page_strict(raw_page)?;
        let page = self.load_page(&query_filter, window).await?;

        Ok(ListingContext {
            heading: "Archive".to_string(),
            pagination: PaginationView::new(&page.window, "/posts/"),
            posts: page.items,
            tag: None,
        })
    }

    async fn load_page(
        &self,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<Page<PostCard>, FeedError> {
        let records = self.posts.list_published(filter, window.slice()).await?;
        let mut items = Vec::with_capacity(records.len());
        for record in &records {
            let tags = self.tags.list_for_post(record.id).await?;
            items.push(record_to_card(record, &tags, self.timezone));
        }
        Ok(Page { items, window })
    }

    pub async fn post_detail(
        &self,
        address: PostAddress<'_>,
    ) -> Result<PostDetailContext, FeedError> {
        let post = self.resolve_post(address).await?;
        self.build_detail(post, None, CommentFormView::default())
            .await
    }

    /// Validate and store a comment, then render the detail context.
    ///
    /// An invalid form is reported through the returned context, never as an
    /// error, and nothing is stored.
    pub async fn submit_comment(
        &self,
        address: PostAddress<'_>,
        form: &CommentForm,
    ) -> Result<PostDetailContext, FeedError> {
        let post = self.resolve_post(address).await?;

        let command = match form.validate() {
            Ok(command) => command,
            Err(errors) => {
                let form_view = CommentFormView {
                    name: form.name.clone(),
                    email: form.email.clone(),
                    body: form.body.clone(),
                    errors,
                };
                return self.build_detail(post, None, form_view).await;
            }
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                name: command.name,
                email: command.email,
                body: command.body,
            })
            .await?;

        counter!(METRIC_COMMENTS_CREATED).increment(1);
        info!(
            target = "quire::application::feed",
            post_id = post.id,
            comment_id = comment.id,
            "comment created"
        );

        let new_comment = comment_view(&comment, self.timezone);
        self.build_detail(post, Some(new_comment), CommentFormView::default())
            .await
    }

    async fn resolve_post(&self, address: PostAddress<'_>) -> Result<PostRecord, FeedError> {
        if !posts::is_valid_slug(address.slug) {
            return Err(FeedError::UnknownPost);
        }
        let date = posts::parse_publish_date(address.year, address.month, address.day)
            .map_err(|_| FeedError::UnknownPost)?;

        self.posts
            .find_published_by_date(address.slug, date, self.timezone)
            .await?
            .ok_or(FeedError::UnknownPost)
    }

    async fn build_detail(
        &self,
        post: PostRecord,
        new_comment: Option<CommentView>,
        form: CommentFormView,
    ) -> Result<PostDetailContext, FeedError> {
        let tags = self.tags.list_for_post(post.id).await?;
        let comments = self
            .comments
            .list_active(post.id)
            .await?
            .iter()
            .map(|comment| comment_view(comment, self.timezone))
            .collect();

        Ok(PostDetailContext {
            post: post_view(&post, &tags, self.timezone),
            comments,
            new_comment,
            form,
        })
    }
}

pub(crate) fn tag_view(tag: &TagRecord) -> TagView {
    TagView {
        slug: tag.slug.clone(),
        name: tag.name.clone(),
        href: posts::tag_path(&tag.slug),
    }
}

pub(crate) fn post_href(record: &PostRecord, timezone: Tz) -> String {
    posts::post_path(
        posts::local_publish_date(record.publish, timezone),
        &record.slug,
    )
}

fn record_to_card(record: &PostRecord, tags: &[TagRecord], timezone: Tz) -> PostCard {
    PostCard {
        id: record.id,
        title: record.title.clone(),
        href: post_href(record, timezone),
        author: record.author.clone(),
        published_on: posts::format_human_datetime(record.publish, timezone),
        excerpt: posts::truncate_words(&record.body, posts::EXCERPT_WORDS),
        tags: tags.iter().map(tag_view).collect(),
    }
}

pub(crate) fn post_view(record: &PostRecord, tags: &[TagRecord], timezone: Tz) -> PostView {
    PostView {
        id: record.id,
        title: record.title.clone(),
        href: post_href(record, timezone),
        share_href: posts::share_path(record.id),
        author: record.author.clone(),
        published_on: posts::format_human_datetime(record.publish, timezone),
        paragraphs: posts::paragraphs(&record.body),
        tags: tags.iter().map(tag_view).collect(),
    }
}

fn comment_view(comment: &CommentRecord, timezone: Tz) -> CommentView {
    CommentView {
        id: comment.id,
        name: comment.name.clone(),
        created_on: posts::format_human_datetime(comment.created, timezone),
        paragraphs: posts::paragraphs(&comment.body),
    }
}
