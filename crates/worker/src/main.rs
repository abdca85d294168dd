//! Pushline delivery worker binary entrypoint.
//!
//! Runs `WORKER_COUNT` delivery workers (one in-flight message each) plus
//! the retry mover. Scaling is by adding worker instances, not per-worker
//! concurrency.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

use pushline_common::config::AppConfig;
use pushline_common::db::create_pool;
use pushline_common::redis_pool::create_redis_pool;
use pushline_common::store::NotificationStore;
use pushline_queue::{DurableQueue, QueueConfig, RetryMover};
use pushline_sender::FcmSender;
use pushline_worker::DeliveryWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pushline_worker=info,pushline_queue=info,pushline_sender=info".into()),
        )
        .json()
        .init();

    tracing::info!("Pushline worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let store = NotificationStore::new(pool);

    // Provider sender, shared across workers
    let credential_path = config.fcm_credentials_path.as_deref().ok_or_else(|| {
        anyhow::anyhow!("FCM_CREDENTIALS_PATH environment variable is required for the worker")
    })?;
    let sender = Arc::new(FcmSender::new(
        credential_path,
        config.fcm_endpoint.clone(),
        config.sender_max_attempts,
        config.sender_backoff_ms,
    )?);

    // Retry mover gets its own broker connection
    let mover_redis = create_redis_pool(&config.redis_url).await?;
    let mover = RetryMover::new(mover_redis, QueueConfig::new("mover", config.retry_delay_ms));
    let mover_handle = tokio::spawn(async move { mover.run().await });

    // Delivery workers, stable consumer names so recovery works across restarts
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = JoinSet::new();
    for i in 0..config.worker_count {
        let redis = create_redis_pool(&config.redis_url).await?;
        let queue = DurableQueue::new(
            redis,
            QueueConfig::new(format!("worker-{i}"), config.retry_delay_ms),
        );
        let worker = DeliveryWorker::new(
            queue,
            store.clone(),
            Arc::clone(&sender),
            config.max_retries,
            Duration::from_secs(config.worker_poll_timeout_secs),
            config.worker_error_policy,
        );
        let shutdown = shutdown_rx.clone();
        workers.spawn(async move { worker.run(shutdown).await });
    }
    drop(shutdown_rx);

    tracing::info!(workers = config.worker_count, "Pushline worker running");

    // Graceful shutdown: finish in-flight messages, then exit
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, draining in-flight messages...");
    shutdown_tx.send(true)?;

    while let Some(result) = workers.join_next().await {
        if let Err(e) = result? {
            tracing::error!(error = %e, "Worker exited with error");
        }
    }
    mover_handle.abort();

    tracing::info!("Pushline worker stopped.");
    Ok(())
}
