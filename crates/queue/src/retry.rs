//! Retry-due mover — returns held messages from the retry channel to `main`.
//!
//! The retry channel is a sorted set scored by due-time in epoch millis.
//! Nothing consumes it directly; this loop periodically moves every due
//! member back onto the main channel in one atomic Lua script, so a
//! message can never be both in retry and in main.

use std::time::Duration;

use chrono::Utc;
use redis::aio::ConnectionManager;

use pushline_common::error::AppError;

use crate::queue::QueueConfig;

/// How often the mover checks for due messages.
const MOVE_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on messages moved per tick, to keep single invocations short.
const MOVE_BATCH: usize = 100;

const MOVE_DUE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, raw in ipairs(due) do
    redis.call('ZREM', KEYS[1], raw)
    redis.call('LPUSH', KEYS[2], raw)
end
return #due
"#;

/// Background loop enforcing the retry hold delay broker-side.
pub struct RetryMover {
    redis: ConnectionManager,
    config: QueueConfig,
    script: redis::Script,
}

impl RetryMover {
    pub fn new(redis: ConnectionManager, config: QueueConfig) -> Self {
        Self {
            redis,
            config,
            script: redis::Script::new(MOVE_DUE_SCRIPT),
        }
    }

    /// Run until cancelled. Redis errors are logged and retried after a
    /// backoff — a broker outage must not kill the mover.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(retry_key = %self.config.retry_key, "Retry mover started");
        loop {
            match self.move_due().await {
                Ok(moved) if moved > 0 => {
                    tracing::info!(moved, "Returned due messages to main");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Retry mover tick failed, backing off 5s");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
            tokio::time::sleep(MOVE_INTERVAL).await;
        }
    }

    /// Move every due message back to `main`. Returns how many moved.
    pub async fn move_due(&self) -> Result<usize, AppError> {
        let now_ms = Utc::now().timestamp_millis();
        let mut conn = self.redis.clone();
        let moved: usize = self
            .script
            .key(&self.config.retry_key)
            .key(&self.config.main_key)
            .arg(now_ms)
            .arg(MOVE_BATCH)
            .invoke_async(&mut conn)
            .await?;
        Ok(moved)
    }
}
