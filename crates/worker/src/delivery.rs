//! Delivery worker — consumes the main channel and carries each message
//! to a terminal outcome.
//!
//! Per message: parse, look up the record, validate the token, invoke the
//! provider, persist the outcome, then route: ack on success, retry channel
//! while the budget lasts, DLQ once it is exhausted. The record store holds
//! the authoritative retry count; the queue payload never changes across
//! retries.

use std::time::Duration;

use tokio::sync::watch;

use pushline_common::config::ErrorPolicy;
use pushline_common::error::AppError;
use pushline_common::store::NotificationStore;
use pushline_common::types::{DeliveryStatus, PushMessage};
use pushline_queue::{Delivery, DurableQueue};
use pushline_sender::{PushSend, is_valid_token};

/// Reason attached to dead-lettered messages.
const DLQ_REASON_RETRIES: &str = "max retries exceeded";

/// Backoff after a queue error before the next receive attempt.
const QUEUE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Terminal outcome of one processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Provider accepted the message; acked on main.
    Delivered,
    /// Failed attempt, retry budget left; on the retry channel with the
    /// given store-side retry count.
    Requeued(i32),
    /// Retry budget exhausted; relocated to the DLQ.
    DeadLettered,
    /// Removed without redelivery (unparseable payload or fatal error).
    Dropped,
}

/// One consumer instance. Processes a single message at a time.
pub struct DeliveryWorker<S: PushSend> {
    queue: DurableQueue,
    store: NotificationStore,
    sender: S,
    max_retries: i32,
    poll_timeout: Duration,
    error_policy: ErrorPolicy,
}

impl<S: PushSend> DeliveryWorker<S> {
    pub fn new(
        queue: DurableQueue,
        store: NotificationStore,
        sender: S,
        max_retries: i32,
        poll_timeout: Duration,
        error_policy: ErrorPolicy,
    ) -> Self {
        Self {
            queue,
            store,
            sender,
            max_retries,
            poll_timeout,
            error_policy,
        }
    }

    /// Consume until shutdown is signalled. An in-flight message is always
    /// carried to its terminal outcome before the loop exits; only the next
    /// claim is skipped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let reclaimed = self.queue.recover().await?;
        tracing::info!(
            consumer = %self.queue.config().consumer,
            reclaimed,
            "Worker started. Waiting for messages..."
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delivery = tokio::select! {
                _ = shutdown.changed() => continue,
                got = self.queue.receive(self.poll_timeout) => match got {
                    Ok(Some(delivery)) => delivery,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::error!(error = %e, "Queue receive failed, retrying in 5s...");
                        tokio::time::sleep(QUEUE_RETRY_DELAY).await;
                        continue;
                    }
                },
            };

            match self.process(&delivery).await {
                Ok(outcome) => {
                    tracing::debug!(outcome = ?outcome, "Message settled");
                }
                Err(e) => self.settle_after_error(&delivery, e).await,
            }
        }

        tracing::info!(consumer = %self.queue.config().consumer, "Worker stopped");
        Ok(())
    }

    /// Carry one claimed message to a terminal outcome.
    pub async fn process(&self, delivery: &Delivery) -> Result<Outcome, AppError> {
        // Unparseable payloads can never become parseable; drop them.
        let msg: PushMessage = match serde_json::from_str(&delivery.raw) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable payload, dropping");
                self.queue.nack(delivery, false).await?;
                return Ok(Outcome::Dropped);
            }
        };
        tracing::info!(id = %msg.id, title = %msg.title, "Processing message");

        // The queue message stays authoritative for delivery even when the
        // record is missing; persistence and queue are not coupled.
        let record = self.store.find(&msg.id).await?;
        if record.is_none() {
            tracing::warn!(id = %msg.id, "Message not found in store");
        }

        let success = if !is_valid_token(&msg.token) {
            tracing::warn!(id = %msg.id, "Invalid device token");
            false
        } else {
            self.sender.send(&msg).await
        };

        // Persist the outcome before acking, so the record reflects it even
        // if the process dies right after.
        if success {
            self.store
                .set_status(&msg.id, DeliveryStatus::Success)
                .await?;
            self.queue.ack(delivery).await?;
            tracing::info!(id = %msg.id, "Message delivered");
            return Ok(Outcome::Delivered);
        }

        let retry_count = record.map(|r| r.retry_count).unwrap_or(0);
        if retry_count >= self.max_retries {
            self.store
                .set_status(&msg.id, DeliveryStatus::Failed)
                .await?;
            let id = msg.id.clone();
            self.queue.push_to_dlq(msg, DLQ_REASON_RETRIES).await?;
            self.queue.ack(delivery).await?;
            tracing::error!(id = %id, "Message failed permanently -> DLQ");
            Ok(Outcome::DeadLettered)
        } else {
            let next = self
                .store
                .fail_and_bump_retry(&msg.id)
                .await?
                .unwrap_or(retry_count + 1);
            self.queue.push_to_retry(&delivery.raw).await?;
            self.queue.ack(delivery).await?;
            tracing::warn!(
                id = %msg.id,
                retry = next,
                max_retries = self.max_retries,
                "Message failed, scheduled for retry"
            );
            Ok(Outcome::Requeued(next))
        }
    }

    /// Settle a message that hit an unexpected error mid-processing.
    ///
    /// Store errors always drop without requeue: retry accounting could not
    /// be updated, and redelivering would mean guessing at delivery state.
    /// Everything else follows the configured policy.
    async fn settle_after_error(&self, delivery: &Delivery, err: AppError) {
        tracing::error!(error = %err, "Error processing message");

        let settled = match (&err, self.error_policy) {
            (AppError::Database(_), _) | (_, ErrorPolicy::Drop) => {
                self.queue.nack(delivery, false).await
            }
            (_, ErrorPolicy::Requeue) => {
                match self.queue.push_to_retry(&delivery.raw).await {
                    Ok(()) => self.queue.ack(delivery).await,
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = settled {
            // The claim stays in the processing list; recover() picks it up
            // on the next start.
            tracing::error!(error = %e, "Could not settle message after error");
        }
    }
}
