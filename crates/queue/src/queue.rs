use std::time::Duration;

use chrono::Utc;
use redis::aio::ConnectionManager;
use tokio::time::Instant;

use pushline_common::error::AppError;
use pushline_common::types::{DlqEntry, PushMessage};

/// How often `receive` re-polls the main channel while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Channel names and per-consumer identity for one queue handle.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub main_key: String,
    pub retry_key: String,
    pub dlq_key: String,
    /// Stable consumer name. Restarting under the same name lets
    /// [`DurableQueue::recover`] reclaim messages claimed before a crash.
    pub consumer: String,
    pub retry_delay: Duration,
}

impl QueueConfig {
    pub fn new(consumer: impl Into<String>, retry_delay_ms: u64) -> Self {
        Self {
            main_key: "push_queue".to_string(),
            retry_key: "push_queue_retry".to_string(),
            dlq_key: "push_queue_dlq".to_string(),
            consumer: consumer.into(),
            retry_delay: Duration::from_millis(retry_delay_ms),
        }
    }

    /// Prefix every channel key, isolating this handle's keyspace.
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.main_key = format!("{prefix}{}", self.main_key);
        self.retry_key = format!("{prefix}{}", self.retry_key);
        self.dlq_key = format!("{prefix}{}", self.dlq_key);
        self
    }

    pub(crate) fn processing_key(&self) -> String {
        format!("{}:processing:{}", self.main_key, self.consumer)
    }
}

/// A message claimed from `main`, pending ack or nack.
///
/// The raw payload doubles as the acknowledgment handle: it sits in the
/// consumer's processing list until `ack`/`nack` removes it, and becomes
/// eligible for [`DurableQueue::recover`] if the consumer dies first.
#[derive(Debug)]
pub struct Delivery {
    pub raw: String,
}

/// Handle on the three durable channels.
#[derive(Clone)]
pub struct DurableQueue {
    redis: ConnectionManager,
    config: QueueConfig,
}

impl DurableQueue {
    pub fn new(redis: ConnectionManager, config: QueueConfig) -> Self {
        Self { redis, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a message onto `main`. Returns once Redis has accepted it;
    /// an unreachable broker surfaces as [`AppError::Queue`].
    pub async fn push(&self, msg: &PushMessage) -> Result<(), AppError> {
        let raw = serde_json::to_string(msg)?;
        let mut conn = self.redis.clone();
        redis::cmd("LPUSH")
            .arg(&self.config.main_key)
            .arg(&raw)
            .query_async::<()>(&mut conn)
            .await?;

        tracing::info!(id = %msg.id, "Message enqueued");
        Ok(())
    }

    /// Claim the next message from `main`, polling up to `timeout`.
    ///
    /// The message is moved into this consumer's processing list, invisible
    /// to other consumers until acked, nacked, or reclaimed via `recover`.
    pub async fn receive(&self, timeout: Duration) -> Result<Option<Delivery>, AppError> {
        let processing = self.config.processing_key();
        let deadline = Instant::now() + timeout;
        let mut conn = self.redis.clone();

        loop {
            let raw: Option<String> = redis::cmd("LMOVE")
                .arg(&self.config.main_key)
                .arg(&processing)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;

            if let Some(raw) = raw {
                return Ok(Some(Delivery { raw }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Permanently remove a claimed message.
    pub async fn ack(&self, delivery: &Delivery) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        redis::cmd("LREM")
            .arg(self.config.processing_key())
            .arg(1)
            .arg(&delivery.raw)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Drop a claimed message, optionally putting it back on `main`.
    /// `requeue = false` is the terminal drop used for payloads that can
    /// never be processed (e.g. unparseable JSON).
    pub async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        redis::cmd("LREM")
            .arg(self.config.processing_key())
            .arg(1)
            .arg(&delivery.raw)
            .query_async::<()>(&mut conn)
            .await?;

        if requeue {
            redis::cmd("LPUSH")
                .arg(&self.config.main_key)
                .arg(&delivery.raw)
                .query_async::<()>(&mut conn)
                .await?;
        }
        Ok(())
    }

    /// Place a raw payload on the retry channel, due after the configured
    /// hold delay. The due-time lives in Redis, so the delay is enforced
    /// even if every worker dies in the meantime.
    pub async fn push_to_retry(&self, raw: &str) -> Result<(), AppError> {
        let due_at = Utc::now().timestamp_millis() + self.config.retry_delay.as_millis() as i64;
        let mut conn = self.redis.clone();
        redis::cmd("ZADD")
            .arg(&self.config.retry_key)
            .arg(due_at)
            .arg(raw)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Dead-letter a message with an operator-facing reason.
    pub async fn push_to_dlq(&self, msg: PushMessage, reason: &str) -> Result<(), AppError> {
        let id = msg.id.clone();
        let entry = DlqEntry::new(msg, reason);
        let raw = serde_json::to_string(&entry)?;
        let mut conn = self.redis.clone();
        redis::cmd("LPUSH")
            .arg(&self.config.dlq_key)
            .arg(&raw)
            .query_async::<()>(&mut conn)
            .await?;

        tracing::error!(id = %id, reason, "Message dead-lettered");
        Ok(())
    }

    /// Return every message left in this consumer's processing list to
    /// `main`. Run once at startup: anything found was claimed before a
    /// crash and never acked, so it gets redelivered (at-least-once).
    pub async fn recover(&self) -> Result<usize, AppError> {
        let processing = self.config.processing_key();
        let mut conn = self.redis.clone();
        let mut reclaimed = 0usize;

        loop {
            let raw: Option<String> = redis::cmd("LMOVE")
                .arg(&processing)
                .arg(&self.config.main_key)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;
            if raw.is_none() {
                break;
            }
            reclaimed += 1;
        }

        if reclaimed > 0 {
            tracing::warn!(
                consumer = %self.config.consumer,
                reclaimed,
                "Reclaimed unacked messages from previous run"
            );
        }
        Ok(reclaimed)
    }
}
