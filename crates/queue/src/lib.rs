//! Durable queue layer for the push pipeline.
//!
//! Three Redis-backed channels:
//! - `main` — a list consumed with the reliable-queue pattern (claim into a
//!   per-consumer processing list, remove on ack)
//! - `retry` — a sorted set scored by due-time; [`RetryMover`] returns due
//!   messages to `main` so the hold delay survives worker crashes
//! - `dlq` — terminal list of [`pushline_common::types::DlqEntry`] payloads,
//!   consumed only by operators
//!
//! Retry and dead-letter routing are application-level publishes, which
//! keeps the semantics portable across brokers.

pub mod queue;
pub mod retry;

pub use queue::{Delivery, DurableQueue, QueueConfig};
pub use retry::RetryMover;
