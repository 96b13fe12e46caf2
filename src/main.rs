use std::{future::IntoFuture, process, sync::Arc};

use quire::{
    application::{
        error::AppError,
        feed::FeedService,
        repos::{CommentsRepo, HealthRepo, PostsRepo, TagsRepo},
        search::SearchService,
        share::ShareService,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        mail, telemetry,
    },
    presentation::views::LayoutChrome,
};
use tokio::{signal, sync::oneshot, time};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn connect(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let database_url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::validation(
            "database url is required (provide --database-url or set QUIRE__DATABASE__URL)",
        )
    })?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresRepositories::new(pool))
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    connect(&settings).await?;
    info!(target = "quire::migrate", "database migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = Arc::new(connect(&settings).await?);
    let http_state = build_http_state(repositories, &settings)?;
    serve_http(&settings, http_state).await
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let posts: Arc<dyn PostsRepo> = repositories.clone();
    let tags: Arc<dyn TagsRepo> = repositories.clone();
    let comments: Arc<dyn CommentsRepo> = repositories.clone();
    let health: Arc<dyn HealthRepo> = repositories;

    let mailer = mail::build_mailer(&settings.mail)
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let timezone = settings.site.timezone;
    let feed = Arc::new(FeedService::new(
        posts.clone(),
        tags,
        comments,
        timezone,
    ));
    let share = Arc::new(ShareService::new(
        posts.clone(),
        mailer,
        settings.mail.from.clone(),
        timezone,
    ));
    let search = Arc::new(SearchService::new(posts, timezone));

    Ok(HttpState {
        feed,
        share,
        search,
        chrome: LayoutChrome::new(&settings.site.title, &settings.site.description),
        health,
        public_url: settings.site.public_url.clone(),
    })
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "quire::http",
        addr = %settings.server.addr,
        "listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        },
    );
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = signalled_rx => {}
    }

    match time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "quire::http",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(target = "quire::http", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "quire::http", "shutdown signal received; draining connections");
}
