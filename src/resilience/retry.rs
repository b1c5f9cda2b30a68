use std::fmt::Display;
use std::future::Future;
use tokio::time;
use tracing::{debug, error, warn};

use super::{ExponentialBackoff, RetryConfig};
use crate::error::Severity;

/// Run `operation` until it succeeds or `config.max_attempts` attempts have
/// failed, sleeping `initial_backoff * 2^n` after the n-th failure.
///
/// The error of the last attempt is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_if(config, operation, |_| true).await
}

/// Like [`with_retry`], but gives up at once on errors `should_retry` rejects
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut backoff = ExponentialBackoff::new(config.clone());
    let mut attempt = 0usize;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !should_retry(&err) {
            warn!(attempt, error = %err, "Operation failed with a non-retryable error");
            return Err(err);
        }

        match backoff.next_backoff() {
            Some(delay) => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, retrying"
                );
                time::sleep(delay).await;
            }
            None => {
                error!(
                    severity = %Severity::High,
                    attempts = attempt,
                    error = %err,
                    "Operation failed after all retry attempts"
                );
                return Err(err);
            }
        }
    }
}
