use std::{process, sync::Arc};

use postrank::{
    application::error::AppError,
    cache::{
        BackingStore, CacheConfig, CacheConsumer, CacheRegistry, CacheTrigger, EventQueue,
        MemoryStore, ResyncReason,
    },
    config::{self, CacheBackend, ViewArg},
    infra::{db::PostgresRepositories, error::InfraError, redis::RedisStore, telemetry},
};
use tokio::task::JoinHandle;
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
        .unwrap_or(config::Command::Run(config::RunArgs::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Run(_) => run_worker(settings).await,
        config::Command::Resync(args) => run_resync(settings, args.view).await,
        config::Command::Inspect(args) => run_inspect(settings, args.view).await,
    }
}

async fn run_worker(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let registry = Arc::new(build_registry(&settings, &cache_config).await?);

    let queue = Arc::new(EventQueue::new_with_limit(
        cache_config.queue_limit_non_zero().get(),
    ));
    let trigger = CacheTrigger::new(cache_config.clone(), queue.clone());
    let consumer = Arc::new(CacheConsumer::new(cache_config.clone(), registry, queue));

    if !cache_config.enabled {
        warn!("Cache maintenance disabled; views will not be refreshed");
    }

    trigger.resync_all(ResyncReason::Startup);
    let consumer_handle = tokio::spawn(consumer.run());
    let schedule_handle = cache_config
        .resync_interval()
        .map(|period| spawn_scheduled_resync(trigger.clone(), period));

    info!(
        view_capacity = cache_config.view_capacity,
        scheduled_resync = schedule_handle.is_some(),
        "postrank worker running"
    );

    let signal = tokio::signal::ctrl_c().await;

    consumer_handle.abort();
    let _ = consumer_handle.await;
    if let Some(handle) = schedule_handle {
        handle.abort();
        let _ = handle.await;
    }

    signal.map_err(InfraError::Signal)?;
    info!("postrank worker stopped");
    Ok(())
}

fn spawn_scheduled_resync(trigger: CacheTrigger, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Startup resync already queued
        loop {
            interval.tick().await;
            trigger.resync_all(ResyncReason::Scheduled);
        }
    })
}

async fn run_resync(settings: config::Settings, view: Option<ViewArg>) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let registry = build_registry(&settings, &cache_config).await?;

    let outcome = match view {
        Some(view) => registry
            .sync_view(view.as_str())
            .await
            .ok_or(AppError::UnknownView(view.as_str()))?,
        None => registry.sync_from_data_storage().await,
    };

    if !outcome.is_success() {
        for failure in &outcome.failed {
            error!(view = failure.view, error = %failure.error, "Resync failed");
        }
        return Err(AppError::ResyncFailed {
            failed: outcome.failed.len(),
        });
    }

    info!(resynced = ?outcome.resynced, "Resync complete");
    Ok(())
}

async fn run_inspect(settings: config::Settings, view: ViewArg) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let registry = build_registry(&settings, &cache_config).await?;

    let view = registry
        .view(view.as_str())
        .ok_or(AppError::UnknownView(view.as_str()))?;
    let entries = view.entries().await?;

    let output = serde_json::to_string_pretty(&serde_json::json!({
        "view": view.key(),
        "entries": entries,
    }))?;
    println!("{output}");
    Ok(())
}

async fn build_registry(
    settings: &config::Settings,
    cache_config: &CacheConfig,
) -> Result<CacheRegistry, AppError> {
    let repositories = init_repositories(settings).await?;
    let store = init_store(settings).await?;

    Ok(CacheRegistry::with_default_views(
        cache_config,
        store,
        repositories.clone(),
        repositories,
    ))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::postgres("connect", err))?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(|err| InfraError::postgres("health check", err))?;

    Ok(Arc::new(repositories))
}

async fn init_store(settings: &config::Settings) -> Result<Arc<dyn BackingStore>, AppError> {
    match settings.cache.backend {
        CacheBackend::Redis => {
            let store = RedisStore::connect(&settings.redis).await?;
            Ok(Arc::new(store))
        }
        CacheBackend::Memory => {
            warn!("Using in-process memory backend; views are lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
