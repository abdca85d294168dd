//! Response envelope shared by every API surface.
//!
//! Every response, success or failure, carries the same shape:
//! `{success, data, error, message, meta}`.

use serde::Serialize;

/// Pagination block included in every envelope. Endpoints that do not
/// paginate return the zeroed default.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Meta {
    pub total: u64,
    pub limit: u64,
    pub page: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: String,
    pub meta: Meta,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: message.into(),
            meta: Meta::default(),
        }
    }

    pub fn err(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: message.into(),
            meta: Meta::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_shape() {
        let env = Envelope::ok(serde_json::json!({"id": "n1"}), "created");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], "n1");
        assert_eq!(json["error"], serde_json::Value::Null);
        assert_eq!(json["meta"]["total"], 0);
        assert_eq!(json["meta"]["has_next"], false);
    }

    #[test]
    fn test_err_envelope_shape() {
        let env: Envelope<serde_json::Value> = Envelope::err("duplicate id", "rejected");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["data"], serde_json::Value::Null);
        assert_eq!(json["error"], "duplicate id");
    }
}
