use std::time::Duration;

use redis::Client;
use redis::aio::ConnectionManager;

/// How long to wait between connection attempts while the broker is down.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Create a Redis connection manager for async operations.
///
/// Broker outages are expected to be transient infrastructure events, so
/// this retries connection establishment indefinitely with a fixed delay
/// instead of failing the process. Once established, the manager
/// reconnects on its own after drops.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;

    loop {
        match ConnectionManager::new(client.clone()).await {
            Ok(manager) => {
                tracing::info!("Connected to Redis");
                return Ok(manager);
            }
            Err(e) => {
                tracing::error!(error = %e, "Redis connection failed, retrying in 5s...");
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
}
