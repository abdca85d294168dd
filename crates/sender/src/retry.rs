use std::future::Future;
use std::time::Duration;

/// Run `op` up to `max_attempts` times with a fixed backoff between
/// attempts, returning the first success or the last error.
///
/// This is the provider-level retry: it recovers short transport blips
/// before a failure is reported upward, independent of (and composing
/// with) the queue-level retry cycle.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_first_try_without_backoff() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> =
            retry_with_backoff(3, Duration::from_secs(2), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, &str> =
            retry_with_backoff(3, Duration::from_secs(2), || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("connection reset")
                } else {
                    Ok("delivered")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "delivered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_last_error_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            retry_with_backoff(3, Duration::from_secs(2), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {n} failed"))
            })
            .await;
        assert_eq!(result.unwrap_err(), "attempt 3 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
