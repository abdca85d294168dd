//! FCM sender — certificate/server-key based push transport over HTTP.

use std::time::Duration;

use thiserror::Error;

use pushline_common::types::PushMessage;

use crate::PushSend;
use crate::retry::retry_with_backoff;

/// A fault worth retrying at the transport level: the provider never gave
/// a verdict on the message.
#[derive(Debug, Error)]
enum TransientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned {0}")]
    ServerError(reqwest::StatusCode),
}

/// Validate an FCM device token: 20–400 characters drawn from the
/// alphanumeric-plus-`:`/`_`/`-` alphabet.
pub fn is_valid_token(token: &str) -> bool {
    let len = token.chars().count();
    (20..=400).contains(&len)
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-'))
}

/// Push sender backed by the FCM HTTP endpoint.
pub struct FcmSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
    max_attempts: u32,
    backoff: Duration,
}

impl FcmSender {
    /// Build a sender from a credentials file holding the FCM server key.
    pub fn new(
        credential_path: &str,
        endpoint: impl Into<String>,
        max_attempts: u32,
        backoff_ms: u64,
    ) -> anyhow::Result<Self> {
        let server_key = std::fs::read_to_string(credential_path)
            .map_err(|e| anyhow::anyhow!("Cannot read FCM credentials at {credential_path}: {e}"))?
            .trim()
            .to_string();
        anyhow::ensure!(!server_key.is_empty(), "FCM credentials file is empty");

        tracing::info!("FCM sender initialized");
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
            endpoint: endpoint.into(),
            server_key,
            max_attempts,
            backoff: Duration::from_millis(backoff_ms),
        })
    }

    /// Build the FCM message body. The `data` map passes through untouched.
    fn payload(msg: &PushMessage) -> serde_json::Value {
        let mut notification = serde_json::json!({
            "title": msg.title,
            "body": msg.body,
        });
        if let Some(image) = &msg.image {
            notification["image"] = serde_json::json!(image);
        }
        if let Some(url) = &msg.url {
            notification["click_action"] = serde_json::json!(url);
        }

        let mut payload = serde_json::json!({
            "to": msg.token,
            "notification": notification,
        });
        if let Some(data) = &msg.data {
            payload["data"] = serde_json::json!(data);
        }
        payload
    }

    /// One HTTP attempt. `Ok(false)` is a terminal provider rejection;
    /// `Err` means the transport failed and a retry may help.
    async fn attempt(&self, msg: &PushMessage) -> Result<bool, TransientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&Self::payload(msg))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.is_server_error() {
            Err(TransientError::ServerError(status))
        } else {
            tracing::warn!(id = %msg.id, %status, "FCM rejected message");
            Ok(false)
        }
    }
}

impl PushSend for FcmSender {
    async fn send(&self, msg: &PushMessage) -> bool {
        let verdict =
            retry_with_backoff(self.max_attempts, self.backoff, || self.attempt(msg)).await;

        match verdict {
            Ok(accepted) => {
                tracing::info!(id = %msg.id, accepted, "FCM response");
                accepted
            }
            Err(e) => {
                tracing::error!(id = %msg.id, error = %e, "FCM delivery failed after retries");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_token_accepted() {
        assert!(is_valid_token(
            "cPd8:APA91bF_example_device_token-0123456789"
        ));
    }

    #[test]
    fn test_short_token_rejected() {
        assert!(!is_valid_token("short"));
    }

    #[test]
    fn test_overlong_token_rejected() {
        assert!(!is_valid_token(&"a".repeat(401)));
        assert!(is_valid_token(&"a".repeat(400)));
    }

    #[test]
    fn test_token_with_invalid_characters_rejected() {
        assert!(!is_valid_token("abcdefghij klmnopqrst"));
        assert!(!is_valid_token("abcdefghij/klmnopqrst"));
        assert!(!is_valid_token(""));
    }

    #[test]
    fn test_payload_includes_optional_fields_only_when_set() {
        let msg = PushMessage {
            id: "p1".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            token: "tok".to_string(),
            image: None,
            url: Some("https://example.com".to_string()),
            data: None,
            provider: Default::default(),
        };
        let payload = FcmSender::payload(&msg);
        assert_eq!(payload["to"], "tok");
        assert_eq!(payload["notification"]["click_action"], "https://example.com");
        assert!(payload["notification"].get("image").is_none());
        assert!(payload.get("data").is_none());
    }
}
