use anyhow::Context;
use dotenv::dotenv;
use payrelay::api::{self, AppState};
use payrelay::config::{AppConfig, DedupBackend, QueueBackend, StatsBackend};
use payrelay::logging::init_tracing;
use payrelay::payments::breaker::{BreakerConfig, CircuitBreaker};
use payrelay::payments::client::HttpProcessorClient;
use payrelay::payments::processor::PaymentProcessor;
use payrelay::queue::{InMemoryQueue, PaymentQueue, RedisQueue};
use payrelay::repository::{InMemoryStatsRepository, PostgresStatsRepository, StatsRepository};
use payrelay::services::{AuditService, IntakeService, PaymentDispatcher};
use payrelay::store::{DedupStore, InMemoryDedupStore, RedisDedupStore};
use payrelay::workers::{DispatchWorkerPool, WorkerPoolConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        instance = %config.worker.instance_id,
        "starting payrelay gateway"
    );

    let queue: Arc<dyn PaymentQueue> = match config.queue.backend {
        QueueBackend::Memory => Arc::new(InMemoryQueue::new(config.queue.buffer_size)),
        QueueBackend::Redis => Arc::new(
            RedisQueue::connect(&config.redis)
                .await
                .context("failed to initialize redis queue")?,
        ),
    };
    info!(backend = ?config.queue.backend, buffer_size = config.queue.buffer_size, "payment queue initialized");

    let store: Arc<dyn DedupStore> = match config.dedup.backend {
        DedupBackend::Memory => Arc::new(InMemoryDedupStore::new(Some(config.dedup.ttl))),
        DedupBackend::Redis => Arc::new(
            RedisDedupStore::connect(&config.redis, config.dedup.ttl)
                .await
                .context("failed to initialize redis dedup store")?,
        ),
    };
    info!(backend = ?config.dedup.backend, ttl_secs = config.dedup.ttl.as_secs(), "dedup store initialized");

    let repository: Arc<dyn StatsRepository> = match config.stats.backend {
        StatsBackend::Memory => Arc::new(InMemoryStatsRepository::new()),
        StatsBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("DATABASE_URL is required for the postgres stats backend")?;
            Arc::new(
                PostgresStatsRepository::connect(url, config.database.max_connections)
                    .await
                    .context("failed to initialize postgres stats repository")?,
            )
        }
    };
    info!(backend = ?config.stats.backend, "stats repository initialized");

    let default_processor: Arc<dyn PaymentProcessor> = Arc::new(
        HttpProcessorClient::new(&config.processor.default_url, config.processor.timeout)
            .context("failed to build default processor client")?,
    );
    let fallback_processor: Arc<dyn PaymentProcessor> = Arc::new(
        HttpProcessorClient::new(&config.processor.fallback_url, config.processor.timeout)
            .context("failed to build fallback processor client")?,
    );

    let breaker_settings = &config.processor.circuit_breaker;
    let breaker = Arc::new(CircuitBreaker::new(
        "default-processor",
        BreakerConfig {
            max_requests: breaker_settings.max_requests,
            interval: breaker_settings.interval,
            timeout: breaker_settings.timeout,
            failure_ratio: breaker_settings.failure_ratio,
            min_requests: breaker_settings.min_requests,
        },
    ));

    let dispatcher = Arc::new(PaymentDispatcher::new(
        default_processor,
        fallback_processor,
        breaker,
        repository.clone(),
    ));
    let intake = Arc::new(IntakeService::new(
        store,
        queue.clone(),
        config.worker.instance_id.clone(),
    ));
    let audit = Arc::new(AuditService::new(repository));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = Arc::new(DispatchWorkerPool::new(
        queue.clone(),
        dispatcher,
        WorkerPoolConfig::from(&config.worker),
    ));
    let pool_handle = tokio::spawn(pool.clone().run(shutdown_rx));

    let app = api::router(
        AppState { intake, audit },
        &config.server,
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(address = %addr, "http listener bound");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(shutdown_tx.clone()))
        .await
        .context("http server error")?;

    // Stop accepting work, drain the workers, then exit.
    let _ = shutdown_tx.send(true);
    pool.stop().await;
    if let Err(e) = tokio::time::timeout(config.server.shutdown_timeout, pool_handle).await {
        error!(error = %e, "timed out waiting for worker pool shutdown");
    }

    info!("shutdown complete");
    Ok(())
}
