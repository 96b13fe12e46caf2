use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::FormErrors;
use crate::application::pagination::PageWindow;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
    pub canonical: String,
}

impl PageMetaView {
    pub fn with_canonical(self, canonical: String) -> Self {
        Self { canonical, ..self }
    }

    pub fn with_title(self, page_title: &str) -> Self {
        Self {
            title: format!("{page_title} | {}", self.title),
            ..self
        }
    }
}

/// Site-wide frame shared by every page.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let title = title.into();
        let entries = [("Posts", "/"), ("Archive", "/posts/"), ("Search", "/search/")]
            .into_iter()
            .map(|(label, href)| NavigationLinkView {
                label: label.to_string(),
                href: href.to_string(),
            })
            .collect();

        Self {
            brand: BrandView {
                title: title.clone(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            meta: PageMetaView {
                title,
                description: description.into(),
                canonical: "/".to_string(),
            },
        }
    }

    pub fn with_canonical(self, canonical: String) -> Self {
        Self {
            meta: self.meta.with_canonical(canonical),
            ..self
        }
    }

    pub fn with_title(self, page_title: &str) -> Self {
        Self {
            meta: self.meta.with_title(page_title),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagView {
    pub slug: String,
    pub name: String,
    pub href: String,
}

#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: i64,
    pub title: String,
    pub href: String,
    pub author: String,
    pub published_on: String,
    pub excerpt: String,
    pub tags: Vec<TagView>,
}

/// Previous/next links for a listing page.
#[derive(Debug, Clone)]
pub struct PaginationView {
    pub number: u64,
    pub num_pages: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
}

impl PaginationView {
    pub fn new(window: &PageWindow, base_path: &str) -> Self {
        let link = |number: u64| format!("{base_path}?page={number}");
        Self {
            number: window.number,
            num_pages: window.num_pages,
            previous_href: window.previous_number().map(link),
            next_href: window.next_number().map(link),
        }
    }
}

pub struct ListingContext {
    pub heading: String,
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
    pub tag: Option<TagView>,
}

#[derive(Template)]
#[template(path = "list.html")]
pub struct ListTemplate {
    pub view: LayoutContext<ListingContext>,
}

#[derive(Debug, Clone)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub href: String,
    pub share_href: String,
    pub author: String,
    pub published_on: String,
    pub paragraphs: Vec<String>,
    pub tags: Vec<TagView>,
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub id: i64,
    pub name: String,
    pub created_on: String,
    pub paragraphs: Vec<String>,
}

/// Comment form values echoed back alongside any validation messages.
#[derive(Debug, Clone, Default)]
pub struct CommentFormView {
    pub name: String,
    pub email: String,
    pub body: String,
    pub errors: FormErrors,
}

pub struct PostDetailContext {
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub new_comment: Option<CommentView>,
    pub form: CommentFormView,
}

impl PostDetailContext {
    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Debug, Clone, Default)]
pub struct ShareFormView {
    pub name: String,
    pub email: String,
    pub to: String,
    pub comments: String,
    pub errors: FormErrors,
}

pub struct ShareContext {
    pub post: PostView,
    pub form: ShareFormView,
    pub sent: bool,
    /// Absolute link included in the message once sent.
    pub post_url: Option<String>,
}

#[derive(Template)]
#[template(path = "share.html")]
pub struct ShareTemplate {
    pub view: LayoutContext<ShareContext>,
}

#[derive(Debug, Clone)]
pub struct SearchResultView {
    pub title: String,
    pub href: String,
    pub published_on: String,
    pub excerpt: String,
    pub similarity: String,
}

pub struct SearchContext {
    pub query: String,
    pub submitted: bool,
    pub errors: FormErrors,
    pub results: Vec<SearchResultView>,
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub view: LayoutContext<SearchContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
