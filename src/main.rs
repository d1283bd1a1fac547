use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use docconv::application::services::{
    BatchOrchestrator, ConversionGateway, ConversionRunner, ConversionWorker, DocumentValidator,
    GatewayLimits, RetentionReaper, RetentionSettings, RetryPolicy, WorkerPool,
};
use docconv::infrastructure::broker::BrokerFactory;
use docconv::infrastructure::conversion::{ConverterFactory, HttpDocumentFetcher};
use docconv::infrastructure::observability::{TracingConfig, init_tracing};
use docconv::infrastructure::persistence::{JobStatusStoreFactory, create_pool, run_migrations};
use docconv::infrastructure::storage::StagingStoreFactory;
use docconv::presentation::config::StoreProvider;
use docconv::presentation::{AppState, Environment, Settings, UploadLimits, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;

    let settings = Settings::load(environment).context("Failed to load settings")?;

    init_tracing(
        TracingConfig::from_settings(&settings.logging, environment),
        settings.server.port,
    );

    let store_pool = match settings.store.provider {
        StoreProvider::Postgres => {
            let url = settings.store.url.as_deref().context("store.url is required")?;
            Some(connect(url, settings.store.max_connections).await?)
        }
        StoreProvider::Memory => None,
    };
    let broker_pool = match settings.broker.provider {
        StoreProvider::Postgres => match (&store_pool, settings.broker.url.as_deref()) {
            (Some(pool), None) => Some(pool.clone()),
            (Some(pool), Some(url)) if Some(url) == settings.store.url.as_deref() => {
                Some(pool.clone())
            }
            _ => {
                let url = settings.broker_url().context("broker.url is required")?;
                Some(connect(url, settings.store.max_connections).await?)
            }
        },
        StoreProvider::Memory => None,
    };

    let store = JobStatusStoreFactory::create(&settings.store, store_pool.clone())?;
    let broker = BrokerFactory::create(&settings.broker, broker_pool.clone())?;
    let staging = StagingStoreFactory::create(&settings.staging)?;
    let converter = ConverterFactory::create(&settings.converter)?;
    let fetcher = Arc::new(HttpDocumentFetcher::new(
        settings.limits.url_fetch_timeout(),
        settings.limits.max_document_size_bytes(),
    )?);

    let policy = RetryPolicy::new(
        settings.workers.max_retries,
        Duration::from_millis(settings.workers.retry_backoff_base_ms),
        Duration::from_millis(settings.workers.retry_backoff_max_ms),
    );
    let runner = ConversionRunner::new(converter, settings.workers.task_timeout());
    let orchestrator = Arc::new(BatchOrchestrator::new(Arc::clone(&store)));

    let gateway = Arc::new(ConversionGateway::new(
        Arc::clone(&store),
        Arc::clone(&broker),
        Arc::clone(&staging),
        fetcher,
        Arc::clone(&orchestrator),
        runner.clone(),
        DocumentValidator::new(settings.limits.max_document_size_bytes()),
        GatewayLimits {
            max_batch_documents: settings.limits.max_batch_documents,
            sync_concurrency: settings.limits.sync_concurrency,
        },
    ));

    let worker = ConversionWorker::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        Arc::clone(&staging),
        Arc::clone(&orchestrator),
        runner,
        policy,
    )
    .with_idle_backoff(settings.broker.poll_interval());
    let worker_pool = WorkerPool::start(worker, settings.workers.pool_size);

    let reaper = RetentionReaper::new(
        Arc::clone(&store),
        Arc::clone(&staging),
        Arc::clone(&broker),
        Arc::clone(&orchestrator),
        policy,
        RetentionSettings {
            job_ttl: Duration::from_secs(settings.retention.job_ttl_secs),
            stale_running_after: settings.workers.task_timeout()
                + Duration::from_secs(settings.retention.stale_running_grace_secs),
            stale_pending_after: policy.backoff_max
                + Duration::from_secs(settings.retention.stale_pending_grace_secs),
            sweep_interval: Duration::from_secs(settings.retention.sweep_interval_secs),
        },
    );
    let reaper_cancel = CancellationToken::new();
    let reaper_handle = tokio::spawn(reaper.run(reaper_cancel.clone()));

    let app = create_router(AppState::new(
        gateway,
        UploadLimits {
            max_document_bytes: settings.limits.max_document_size_bytes(),
            max_batch_documents: settings.limits.max_batch_documents,
        },
    ));

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining workers");
    reaper_cancel.cancel();
    worker_pool.shutdown().await;
    if let Err(e) = reaper_handle.await {
        tracing::error!(error = %e, "Retention reaper task failed");
    }

    if let Some(pool) = broker_pool {
        pool.close().await;
    }
    if let Some(pool) = store_pool {
        pool.close().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn connect(url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = create_pool(url, max_connections).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
