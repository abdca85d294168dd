use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Push provider handling a message. Only the certificate-based FCM
/// transport is implemented today; the tag keeps the wire format open
/// for additional providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushProvider {
    #[default]
    Fcm,
}

impl std::fmt::Display for PushProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushProvider::Fcm => write!(f, "fcm"),
        }
    }
}

/// Delivery lifecycle status of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Success => write!(f, "success"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Queue wire payload for a single push notification.
///
/// `id` is caller-assigned, immutable, and joins the queue message to the
/// persisted [`PushRecord`]. The payload itself is authoritative for
/// delivery; the record tracks the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Destination device token for the provider.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Click-target URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Opaque key-value payload passed through to the provider untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
    #[serde(default)]
    pub provider: PushProvider,
}

/// Persisted lifecycle record of a notification.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PushRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub token: String,
    pub status: DeliveryStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dead-letter wrapper. Carries the original payload plus enough context
/// for an operator to triage without consulting external state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub message: PushMessage,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl DlqEntry {
    pub fn new(message: PushMessage, reason: impl Into<String>) -> Self {
        Self {
            message,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_message() -> PushMessage {
        let mut data = HashMap::new();
        data.insert("order_id".to_string(), "8812".to_string());
        PushMessage {
            id: "msg-001".to_string(),
            title: "Order shipped".to_string(),
            body: "Your order is on the way".to_string(),
            token: "cPd8:APA91bF_example_device_token_0123456789".to_string(),
            image: Some("https://cdn.example.com/box.png".to_string()),
            url: Some("https://example.com/orders/8812".to_string()),
            data: Some(data),
            provider: PushProvider::Fcm,
        }
    }

    #[test]
    fn test_message_round_trip_preserves_all_fields() {
        let msg = full_message();
        let json = serde_json::to_string(&msg).unwrap();
        let back: PushMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_message_optional_fields_omitted_when_none() {
        let msg = PushMessage {
            image: None,
            url: None,
            data: None,
            ..full_message()
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("image").is_none());
        assert!(json.get("url").is_none());
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_message_deserializes_without_provider_tag() {
        let json = r#"{"id":"a","title":"t","body":"b","token":"tok"}"#;
        let msg: PushMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.provider, PushProvider::Fcm);
        assert!(msg.data.is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DeliveryStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(DeliveryStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_dlq_entry_round_trip() {
        let entry = DlqEntry::new(full_message(), "max retries exceeded");
        let json = serde_json::to_string(&entry).unwrap();
        let back: DlqEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message, entry.message);
        assert_eq!(back.reason, "max retries exceeded");
    }
}
