use serde::Deserialize;

use crate::error::AppError;

/// What the worker does with a message that hit an unexpected processing
/// error (as opposed to an ordinary delivery failure).
///
/// `Drop` mirrors the conservative default: nack without requeue so a
/// poison message cannot crash-loop the worker. `Requeue` routes the
/// message through the retry channel instead, bounded by the normal
/// retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    Drop,
    Requeue,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(ErrorPolicy::Drop),
            "requeue" => Ok(ErrorPolicy::Requeue),
            other => Err(AppError::Config(format!(
                "WORKER_ERROR_POLICY must be 'drop' or 'requeue', got '{other}'"
            ))),
        }
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (queue broker)
    pub redis_url: String,

    /// Path to the FCM service credentials file (required by the worker)
    pub fcm_credentials_path: Option<String>,

    /// FCM send endpoint (overridable for tests/stubs)
    pub fcm_endpoint: String,

    /// Queue-level retry budget before a message is dead-lettered (default: 3)
    pub max_retries: i32,

    /// Hold time on the retry channel before re-delivery to main, in ms (default: 5000)
    pub retry_delay_ms: u64,

    /// How long a worker polls `main` before giving up one receive cycle (default: 5)
    pub worker_poll_timeout_secs: u64,

    /// Number of delivery workers to run in this process (default: 1)
    pub worker_count: u32,

    /// Policy for unexpected processing errors (default: drop)
    pub worker_error_policy: ErrorPolicy,

    /// Provider-level send attempts per delivery (default: 3)
    pub sender_max_attempts: u32,

    /// Fixed backoff between provider-level attempts, in ms (default: 2000)
    pub sender_backoff_ms: u64,

    /// Port the ingestion API listens on (default: 3000)
    pub api_port: u16,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            fcm_credentials_path: std::env::var("FCM_CREDENTIALS_PATH").ok(),
            fcm_endpoint: std::env::var("FCM_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".to_string()),
            max_retries: std::env::var("MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_RETRIES must be a valid i32"))?,
            retry_delay_ms: std::env::var("RETRY_DELAY_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_DELAY_MS must be a valid u64"))?,
            worker_poll_timeout_secs: std::env::var("WORKER_POLL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_POLL_TIMEOUT_SECS must be a valid u64"))?,
            worker_count: std::env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_COUNT must be a valid u32"))?,
            worker_error_policy: std::env::var("WORKER_ERROR_POLICY")
                .unwrap_or_else(|_| "drop".to_string())
                .parse()?,
            sender_max_attempts: std::env::var("SENDER_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SENDER_MAX_ATTEMPTS must be a valid u32"))?,
            sender_backoff_ms: std::env::var("SENDER_BACKOFF_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SENDER_BACKOFF_MS must be a valid u64"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_policy_parses() {
        assert_eq!("drop".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Drop);
        assert_eq!(
            "Requeue".parse::<ErrorPolicy>().unwrap(),
            ErrorPolicy::Requeue
        );
        assert!("keep".parse::<ErrorPolicy>().is_err());
    }
}
