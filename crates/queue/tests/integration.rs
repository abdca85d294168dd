//! Integration tests for the durable queue layer.
//!
//! Requires a running Redis with `REDIS_URL` env var set (defaults to
//! `redis://localhost:6379`). Run with:
//!
//! ```bash
//! cargo test -p pushline-queue --test integration -- --ignored --nocapture
//! ```

use std::time::Duration;

use uuid::Uuid;

use pushline_common::redis_pool::create_redis_pool;
use pushline_common::types::{DlqEntry, PushMessage};
use pushline_queue::{DurableQueue, QueueConfig, RetryMover};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Fresh queue handle with an isolated keyspace per test.
async fn test_queue(retry_delay_ms: u64) -> DurableQueue {
    let redis = create_redis_pool(&redis_url()).await.unwrap();
    let config =
        QueueConfig::new("worker-0", retry_delay_ms).with_key_prefix(&format!("test:{}:", Uuid::new_v4()));
    DurableQueue::new(redis, config)
}

fn message(id: &str) -> PushMessage {
    PushMessage {
        id: id.to_string(),
        title: "title".to_string(),
        body: "body".to_string(),
        token: "cPd8:APA91bF_example_device_token_0123456789".to_string(),
        image: None,
        url: None,
        data: None,
        provider: Default::default(),
    }
}

async fn llen(key: &str) -> usize {
    let mut conn = create_redis_pool(&redis_url()).await.unwrap();
    redis::cmd("LLEN")
        .arg(key)
        .query_async(&mut conn)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_push_receive_ack_round_trip() {
    let queue = test_queue(5000).await;
    let msg = message("q-round-trip");
    queue.push(&msg).await.unwrap();

    let delivery = queue
        .receive(Duration::from_secs(1))
        .await
        .unwrap()
        .expect("message should be available");

    // Payload survives transit field-identical
    let received: PushMessage = serde_json::from_str(&delivery.raw).unwrap();
    assert_eq!(received, msg);

    queue.ack(&delivery).await.unwrap();

    // Nothing left on main or processing
    assert!(queue.receive(Duration::from_millis(100)).await.unwrap().is_none());
    assert_eq!(llen(&queue.config().main_key).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_receive_times_out_on_empty_channel() {
    let queue = test_queue(5000).await;
    let got = queue.receive(Duration::from_millis(200)).await.unwrap();
    assert!(got.is_none());
}

#[tokio::test]
#[ignore]
async fn test_nack_with_requeue_redelivers() {
    let queue = test_queue(5000).await;
    queue.push(&message("q-nack")).await.unwrap();

    let delivery = queue.receive(Duration::from_secs(1)).await.unwrap().unwrap();
    queue.nack(&delivery, true).await.unwrap();

    let again = queue.receive(Duration::from_secs(1)).await.unwrap();
    assert!(again.is_some());
}

#[tokio::test]
#[ignore]
async fn test_nack_without_requeue_drops() {
    let queue = test_queue(5000).await;
    queue.push(&message("q-drop")).await.unwrap();

    let delivery = queue.receive(Duration::from_secs(1)).await.unwrap().unwrap();
    queue.nack(&delivery, false).await.unwrap();

    assert!(queue.receive(Duration::from_millis(100)).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_retry_mover_returns_due_messages_to_main() {
    // 200ms hold so the test stays fast
    let queue = test_queue(200).await;
    let redis = create_redis_pool(&redis_url()).await.unwrap();
    let mover = RetryMover::new(redis, queue.config().clone());

    let raw = serde_json::to_string(&message("q-retry")).unwrap();
    queue.push_to_retry(&raw).await.unwrap();

    // Not yet due
    assert_eq!(mover.move_due().await.unwrap(), 0);
    assert!(queue.receive(Duration::from_millis(100)).await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(mover.move_due().await.unwrap(), 1);
    let delivery = queue.receive(Duration::from_secs(1)).await.unwrap().unwrap();
    assert_eq!(delivery.raw, raw);
}

#[tokio::test]
#[ignore]
async fn test_dlq_entry_carries_reason() {
    let queue = test_queue(5000).await;
    queue
        .push_to_dlq(message("q-dlq"), "max retries exceeded")
        .await
        .unwrap();

    let redis = create_redis_pool(&redis_url()).await.unwrap();
    let mut conn = redis.clone();
    let raw: String = redis::cmd("RPOP")
        .arg(&queue.config().dlq_key)
        .query_async(&mut conn)
        .await
        .unwrap();

    let entry: DlqEntry = serde_json::from_str(&raw).unwrap();
    assert_eq!(entry.message.id, "q-dlq");
    assert_eq!(entry.reason, "max retries exceeded");
}

#[tokio::test]
#[ignore]
async fn test_recover_reclaims_unacked_messages() {
    let queue = test_queue(5000).await;
    queue.push(&message("q-crash")).await.unwrap();

    // Claim but never ack — simulates a worker dying mid-message
    let _delivery = queue.receive(Duration::from_secs(1)).await.unwrap().unwrap();
    assert!(queue.receive(Duration::from_millis(100)).await.unwrap().is_none());

    // A restarted worker under the same consumer name gets it back
    assert_eq!(queue.recover().await.unwrap(), 1);
    let redelivered = queue.receive(Duration::from_secs(1)).await.unwrap().unwrap();
    let msg: PushMessage = serde_json::from_str(&redelivered.raw).unwrap();
    assert_eq!(msg.id, "q-crash");
}
