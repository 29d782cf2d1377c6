use std::{process, sync::Arc};

use commentary::{
    application::{
        comments::CommentService,
        error::AppError,
        repos::CommentsRepo,
        stores::{CommentCache, ImageStore},
    },
    config,
    infra::{
        cache::ProcessCache,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::{MemoryCommentsRepo, MemoryImageStore},
        redis::RedisCommentCache,
        telemetry,
        uploads::{S3ImageStore, S3Settings},
    },
};
use tokio::sync::Notify;
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    info!(target = "commentary::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (comments_repo, images, db) = init_storage(&settings).await?;
    let cache = init_cache(&settings.cache).await?;

    let service = Arc::new(CommentService::new(
        comments_repo,
        cache,
        images,
        settings.comments,
    ));
    let router = http::build_router(HttpState::new(service, db));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "commentary::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { trigger.notified().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        () = shutdown_signal() => {
            info!(target = "commentary::serve", "shutdown signal received");
        }
    }

    shutdown.notify_one();
    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = "commentary::serve",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

type Storage = (
    Arc<dyn CommentsRepo>,
    Arc<dyn ImageStore>,
    Option<Arc<PostgresRepositories>>,
);

async fn init_storage(settings: &config::Settings) -> Result<Storage, AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!(
            target = "commentary::serve",
            "no database url configured; comments and images are kept in memory"
        );
        let comments: Arc<dyn CommentsRepo> = Arc::new(MemoryCommentsRepo::new());
        let images: Arc<dyn ImageStore> = Arc::new(MemoryImageStore::new());
        return Ok((comments, images, None));
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    let repositories = Arc::new(PostgresRepositories::new(pool));

    let images = S3ImageStore::connect(&S3Settings {
        bucket: settings.blob.bucket.clone(),
        region: settings.blob.region.clone(),
        endpoint: settings
            .blob
            .endpoint
            .as_ref()
            .map(|url| url.as_str().trim_end_matches('/').to_string()),
    })
    .await;
    info!(
        target = "commentary::serve",
        bucket = images.bucket(),
        "image store ready"
    );

    let comments: Arc<dyn CommentsRepo> = repositories.clone();
    let images: Arc<dyn ImageStore> = Arc::new(images);
    Ok((comments, images, Some(repositories)))
}

async fn init_cache(settings: &config::CacheSettings) -> Result<Arc<dyn CommentCache>, AppError> {
    match settings.redis_url.as_deref() {
        Some(url) => {
            let cache = RedisCommentCache::connect(url, settings.pool_size.get())
                .await
                .map_err(|err| InfraError::cache(err.to_string()))?;
            info!(target = "commentary::serve", "using redis comment cache");
            Ok(Arc::new(cache))
        }
        None => {
            let cache = ProcessCache::new(settings.process_capacity);
            info!(
                target = "commentary::serve",
                capacity = cache.capacity().await.get(),
                "using in-process comment cache"
            );
            Ok(Arc::new(cache))
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
