//! Provider senders for push delivery.
//!
//! A sender wraps one external push transport behind [`PushSend`]. Expected
//! rejections (invalid token, provider outage) surface as `false`, never as
//! a panic; transient transport faults are retried internally before the
//! final verdict reaches the caller.

use std::future::Future;

use pushline_common::types::PushMessage;

pub mod fcm;
pub mod retry;

pub use fcm::{FcmSender, is_valid_token};
pub use retry::retry_with_backoff;

/// One send attempt against a push provider.
///
/// Returns `true` only when the provider positively accepted the message —
/// absence of an error is not success. Implementations apply their own
/// bounded retry for transient transport faults; the caller sees a single
/// boolean verdict.
pub trait PushSend: Send + Sync {
    fn send(&self, msg: &PushMessage) -> impl Future<Output = bool> + Send;
}

impl<S: PushSend> PushSend for std::sync::Arc<S> {
    fn send(&self, msg: &PushMessage) -> impl Future<Output = bool> + Send {
        (**self).send(msg)
    }
}
