//! MediaQ server: scheduled AI processing for media libraries
//!
//! Main entry point that wires the store, broker, worker pool, and daily
//! scheduler together and runs them until a shutdown signal arrives.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use mediaq_broker::BrokerManager;
use mediaq_core::config::AppConfig;
use mediaq_core::error::AppError;
use mediaq_worker::jobs::discovery::DiscoveryJobHandler;
use mediaq_worker::jobs::item::ItemProcessJobHandler;
use mediaq_worker::{
    CommandWorkFunction, DailyScheduler, JobExecutor, JobQueue, LogAlertSink, Supervisor,
    SystemClock,
};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("MEDIAQ_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("MEDIAQ_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting MediaQ v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Item store (and migrations for postgres) ─────────
    let (store, db_pool) = mediaq_database::create_item_store(&config).await?;

    // ── Step 2: Broker and queue ─────────────────────────────────
    tracing::info!("Initializing broker (provider: {})...", config.broker.provider);
    let broker = BrokerManager::new(&config.broker).await?;
    let queue = JobQueue::new(Arc::new(broker), &config.broker, &config.processing);

    // ── Step 3: Job handlers ─────────────────────────────────────
    let work = Arc::new(CommandWorkFunction::new(&config.processing.command)?);
    let mut executor = JobExecutor::new();
    executor.register(Arc::new(DiscoveryJobHandler::new(
        Arc::clone(&store),
        queue.clone(),
    )));
    executor.register(Arc::new(ItemProcessJobHandler::new(Arc::clone(&store), work)));
    let executor = Arc::new(executor);

    // ── Step 4: Shutdown token ───────────────────────────────────
    let shutdown = CancellationToken::new();

    // ── Step 5: Scheduler ────────────────────────────────────────
    let scheduler_handle = DailyScheduler::start(
        &config.scheduler,
        queue.clone(),
        Arc::new(SystemClock),
        shutdown.clone(),
    )
    .await?;

    // ── Step 6: Supervised worker pool ───────────────────────────
    let supervisor = Arc::new(Supervisor::new(
        queue,
        executor,
        Arc::new(LogAlertSink),
        &config,
    ));
    let pool_handle = {
        let supervisor = Arc::clone(&supervisor);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    tracing::info!(
        concurrency = config.worker.concurrency,
        queue = %config.broker.queue,
        "MediaQ running"
    );

    // ── Step 7: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining workers...");
    shutdown.cancel();

    if let Err(e) = pool_handle.await {
        tracing::error!("Worker pool task failed: {}", e);
    }
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            tracing::error!("Scheduler task failed: {}", e);
        }
    }

    if let Some(pool) = db_pool {
        pool.close().await;
    }

    tracing::info!("MediaQ shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
