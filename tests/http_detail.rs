mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use time::macros::datetime;

use common::{MemoryBlog, RecordingMailer, TestApp, app, app_with};
use quire::application::repos::RepoError;
use quire::domain::types::PostStatus;

const POST_URL: &str = "/2024/3/7/hello-world/";

fn seeded() -> (TestApp, i64) {
    let blog = Arc::new(MemoryBlog::default());
    let post = blog.add_post(
        "Hello world",
        "hello-world",
        "First paragraph.\n\nSecond paragraph.",
        datetime!(2024-03-07 10:30 UTC),
        PostStatus::Published,
    );
    blog.add_post(
        "Hidden",
        "hidden",
        "Not yet.",
        datetime!(2024-03-07 11:00 UTC),
        PostStatus::Draft,
    );
    (app(blog, Arc::new(RecordingMailer::default())), post)
}

#[tokio::test]
async fn detail_renders_post_and_active_comments() {
    let (app, post) = seeded();
    app.blog.add_comment(post, "Grace", "Visible remark.", true);
    app.blog.add_comment(post, "Mallory", "Hidden remark.", false);

    let (status, body) = app.get(POST_URL).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>Hello world</h1>"));
    assert!(body.contains("<p>First paragraph.</p>"));
    assert!(body.contains("<p>Second paragraph.</p>"));
    assert!(body.contains("<h2>1 comment</h2>"));
    assert!(body.contains("Visible remark."));
    assert!(!body.contains("Hidden remark."));
    assert!(body.contains(&format!("href=\"/{post}/share/\"")));
    assert!(body.contains("Add a new comment"));
}

#[tokio::test]
async fn mismatched_address_is_not_found() {
    let (app, _) = seeded();

    for uri in [
        "/2024/3/8/hello-world/",
        "/2023/3/7/hello-world/",
        "/2024/4/7/hello-world/",
        "/2024/3/7/goodbye-world/",
        "/2024/13/7/hello-world/",
        "/2024/2/30/hello-world/",
        "/year/3/7/hello-world/",
        "/2024/3/7/hidden/",
    ] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body.contains("Page Not Found"), "{uri}");
    }
}

#[tokio::test]
async fn zero_padded_segments_resolve() {
    let (app, _) = seeded();

    let (status, _) = app.get("/2024/03/07/hello-world/").await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn valid_comment_is_stored_once_and_shown() {
    let (app, post) = seeded();
    assert_eq!(app.blog.active_comment_count(post), 0);

    let (status, body) = app
        .post_form(
            POST_URL,
            "name=Ada&email=ada%40example.com&body=Lovely+write-up.",
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.blog.active_comment_count(post), 1);
    assert!(body.contains("Your comment has been added."));
    assert!(body.contains("<h2>1 comment</h2>"));
    assert!(body.contains("Comment 1 by Ada"));
    assert!(body.contains("Lovely write-up."));
    assert!(!body.contains("Add a new comment"));
}

#[tokio::test]
async fn comment_with_empty_body_is_rejected() {
    let (app, post) = seeded();

    let (status, body) = app
        .post_form(POST_URL, "name=Ada&email=ada%40example.com&body=+++")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.blog.active_comment_count(post), 0);
    assert!(body.contains("data-field=\"body\""));
    assert!(body.contains("This field is required."));
    assert!(body.contains("value=\"Ada\""));
    assert!(body.contains("<h2>0 comments</h2>"));
}

#[tokio::test]
async fn comment_with_bad_email_is_rejected() {
    let (app, post) = seeded();

    let (status, body) = app
        .post_form(POST_URL, "name=Ada&email=not-an-address&body=Hi")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.blog.active_comment_count(post), 0);
    assert!(body.contains("Enter a valid email address."));
}

#[tokio::test]
async fn comment_on_unknown_post_is_not_found() {
    let (app, post) = seeded();

    let (status, _) = app
        .post_form(
            "/2024/3/9/hello-world/",
            "name=Ada&email=ada%40example.com&body=Hi",
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.blog.active_comment_count(post), 0);
}

#[tokio::test]
async fn comment_store_failures_are_server_errors() {
    let (app, post) = seeded();
    let form = "name=Ada&email=ada%40example.com&body=Hi";

    app.blog.fail_next_comment(RepoError::InvalidInput {
        message: "insert violates foreign key comments_post_id_fkey".to_string(),
    });
    let (status, _) = app.post_form(POST_URL, form).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    app.blog.fail_next_comment(RepoError::Duplicate {
        constraint: "comments_pkey".to_string(),
    });
    let (status, _) = app.post_form(POST_URL, form).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    app.blog.fail_next_comment(RepoError::Timeout);
    let (status, _) = app.post_form(POST_URL, form).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    app.blog.fail_next_comment(RepoError::NotFound);
    let (status, body) = app.post_form(POST_URL, form).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Page Not Found"));

    assert_eq!(app.blog.active_comment_count(post), 0);
}

#[tokio::test]
async fn urls_follow_site_timezone() {
    let blog = Arc::new(MemoryBlog::default());
    blog.add_post(
        "Late night",
        "late-night",
        "Written after dinner.",
        datetime!(2024-03-07 23:30 UTC),
        PostStatus::Published,
    );
    let app = app_with(
        blog,
        Arc::new(RecordingMailer::default()),
        chrono_tz::Europe::Madrid,
        None,
    );

    let (_, listing) = app.get("/").await;
    assert!(listing.contains("href=\"/2024/3/8/late-night/\""));

    let (status, _) = app.get("/2024/3/8/late-night/").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/2024/3/7/late-night/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
