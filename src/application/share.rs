//! Recommending a post to someone by email.

use std::sync::Arc;

use chrono_tz::Tz;
use metrics::counter;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::application::feed::{post_href, post_view};
use crate::application::forms::{EmailPostForm, ShareRequest};
use crate::application::mail::{MailError, Mailer, OutgoingEmail};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::presentation::views::{ShareContext, ShareFormView};

pub const DEFAULT_FROM_ADDRESS: &str = "admin@myblog.com";
pub const METRIC_SHARE_EMAILS_SENT: &str = "quire_share_emails_sent_total";

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("unknown post")]
    UnknownPost,
    #[error("cannot determine public URL")]
    MissingPublicUrl,
    #[error("cannot build post URL: {0}")]
    InvalidPostUrl(#[from] url::ParseError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct ShareService {
    posts: Arc<dyn PostsRepo>,
    mailer: Arc<dyn Mailer>,
    from: String,
    timezone: Tz,
}

impl ShareService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        mailer: Arc<dyn Mailer>,
        from: impl Into<String>,
        timezone: Tz,
    ) -> Self {
        Self {
            posts,
            mailer,
            from: from.into(),
            timezone,
        }
    }

    /// Empty share form for a published post.
    pub async fn load(&self, post_id: i64) -> Result<ShareContext, ShareError> {
        let post = self.find_post(post_id).await?;
        Ok(self.context(&post, ShareFormView::default(), None))
    }

    /// Validate the form and, when valid, send one message linking to the post.
    ///
    /// `base` is the absolute origin used for the link; it is only required
    /// once the form has passed validation.
    pub async fn share(
        &self,
        post_id: i64,
        form: &EmailPostForm,
        base: Option<&Url>,
    ) -> Result<ShareContext, ShareError> {
        let post = self.find_post(post_id).await?;

        let request = match form.validate() {
            Ok(request) => request,
            Err(errors) => {
                let form_view = ShareFormView {
                    name: form.name.clone(),
                    email: form.email.clone(),
                    to: form.to.clone(),
                    comments: form.comments.clone(),
                    errors,
                };
                return Ok(self.context(&post, form_view, None));
            }
        };

        let base = base.ok_or(ShareError::MissingPublicUrl)?;
        let post_url = base.join(&post_href(&post, self.timezone))?;
        let email = compose_share_email(&request, &post.title, post_url.as_str(), &self.from);

        self.mailer.send(&email).await?;

        counter!(METRIC_SHARE_EMAILS_SENT).increment(1);
        info!(
            target = "quire::application::share",
            post_id = post.id,
            recipient = %request.to,
            "share email sent"
        );

        let form_view = ShareFormView {
            name: request.name,
            email: request.email,
            to: request.to,
            comments: request.comments,
            errors: Default::default(),
        };
        Ok(self.context(&post, form_view, Some(post_url.to_string())))
    }

    async fn find_post(&self, post_id: i64) -> Result<PostRecord, ShareError> {
        self.posts
            .find_published_by_id(post_id)
            .await?
            .ok_or(ShareError::UnknownPost)
    }

    fn context(
        &self,
        post: &PostRecord,
        form: ShareFormView,
        post_url: Option<String>,
    ) -> ShareContext {
        ShareContext {
            post: post_view(post, &[], self.timezone),
            form,
            sent: post_url.is_some(),
            post_url,
        }
    }
}

/// Message recommending `title` at `url` on behalf of the requester.
pub fn compose_share_email(
    request: &ShareRequest,
    title: &str,
    url: &str,
    from: &str,
) -> OutgoingEmail {
    OutgoingEmail {
        from: from.to_string(),
        to: vec![request.to.clone()],
        subject: format!("{} recommends you read \"{title}\"", request.name),
        body: format!(
            "Read \"{title}\" at {url}\n\n{}'s comments: {}",
            request.name, request.comments
        ),
    }
}
