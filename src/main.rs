use std::{process, sync::Arc};

use listings::{
    application::{
        auth::{AuthService, TokenConfig},
        error::AppError,
        feed::{FeedService, FoldDispatcher},
    },
    cache::{self, FeedCache, FeedCacheConfig},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        shutdown,
        store::RecordStore,
        telemetry,
    },
};
use tokio::time::Instant;
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
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let secret = settings
        .auth
        .require_secret()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?
        .to_string();

    let store = RecordStore::open(&settings.database).await?;

    let cache_config = FeedCacheConfig::from(&settings.cache);
    let cache_store =
        cache::connect(&cache_config).map_err(|err| AppError::from(InfraError::from(err)))?;
    let feed_cache = Arc::new(FeedCache::new(cache_store, &cache_config));

    if let Err(err) = feed_cache.ping().await {
        warn!(
            target = "listings::cache",
            backend = feed_cache.backend(),
            error = %err,
            "Feed cache unreachable at startup; reads will fall back to the record store"
        );
    }

    let folds = FoldDispatcher::new(feed_cache.clone(), cache_config.fold_timeout);
    let feed = Arc::new(FeedService::new(
        store.ads(),
        feed_cache,
        folds,
        settings.database.operation_timeout,
    ));
    let auth = Arc::new(AuthService::new(
        store.users(),
        TokenConfig {
            secret,
            issuer: settings.auth.jwt_issuer.clone(),
            ttl: settings.auth.token_ttl,
        },
    ));

    let state = HttpState {
        feed: feed.clone(),
        auth,
        store: store.health(),
    };

    let grace = settings.server.graceful_shutdown;
    let result = serve_http(&settings, state).await;

    let fold_budget = match &result {
        Ok(Some(deadline)) => deadline.saturating_duration_since(Instant::now()),
        _ => grace,
    };
    if !feed.folds().drain(fold_budget).await {
        warn!(
            target = "listings::shutdown",
            pending = feed.folds().in_flight(),
            "Feed folds still running at shutdown deadline"
        );
    }
    store.close().await;

    result.map(|_| ())
}

/// Returns the shared shutdown deadline once a signal has been handled.
async fn serve_http(
    settings: &config::Settings,
    state: HttpState,
) -> Result<Option<Instant>, AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "listings::server",
        addr = %settings.server.addr,
        "Listening"
    );

    let signal = async {
        if let Err(err) = shutdown::wait_for_signal().await {
            error!(target = "listings::shutdown", error = %err, "Shutdown signal handler failed");
        }
    };
    shutdown::serve_with_grace(listener, router, signal, settings.server.graceful_shutdown)
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let url = settings
        .database
        .require_url()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let pool = PostgresRepositories::connect(
        url,
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(target = "listings::migrate", "Migrations applied");
    pool.close().await;
    Ok(())
}
