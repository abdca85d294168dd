//! Pushline API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pushline_common::config::AppConfig;
use pushline_common::db::create_pool;
use pushline_common::redis_pool::create_redis_pool;
use pushline_common::store::NotificationStore;
use pushline_queue::{DurableQueue, QueueConfig};

use pushline_api::routes::create_router;
use pushline_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pushline_api=debug,pushline_queue=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Pushline API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Create Redis connection; the API only produces, never consumes
    let redis = create_redis_pool(&config.redis_url).await?;
    let queue = DurableQueue::new(redis, QueueConfig::new("api", config.retry_delay_ms));

    // Build application state
    let state = AppState::new(NotificationStore::new(pool), queue, config.clone());

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
