// src/resilience/tests/retry_tests.rs

use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};
use tracing_test::traced_test;

use super::utils::FlakyOperation;
use crate::error::GovernanceError;
use crate::resilience::{with_retry, with_retry_if, RetryConfig};

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_third_attempt() {
    let operation = FlakyOperation::failing_times(2);
    let config = RetryConfig::new(3, Duration::from_millis(100));

    let started = Instant::now();
    let result = with_retry(&config, || operation.execute()).await;

    assert_eq!(assert_ok!(result), "scored");
    assert_eq!(operation.calls(), 3);
    // 100ms after the first failure, 200ms after the second
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_success_stops_further_attempts() {
    let operation = FlakyOperation::failing_times(0);
    let result = with_retry(&RetryConfig::new(5, Duration::from_secs(1)), || {
        operation.execute()
    })
    .await;

    assert_ok!(result);
    assert_eq!(operation.calls(), 1);
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_last_error() {
    let operation = FlakyOperation::always_failing();
    let config = RetryConfig::new(4, Duration::from_millis(10));

    let result = with_retry(&config, || operation.execute()).await;

    let err = assert_err!(result);
    assert_eq!(operation.calls(), 4);
    assert_eq!(
        err,
        GovernanceError::Network("Simulated failure 4".to_string())
    );
    assert!(logs_contain("Operation failed after all retry attempts"));
    assert!(logs_contain("severity=high"));
}

#[tokio::test(start_paused = true)]
async fn test_zero_and_one_mean_single_attempt() {
    for max_attempts in [0, 1] {
        let operation = FlakyOperation::always_failing();
        let started = Instant::now();

        let result = with_retry(
            &RetryConfig::new(max_attempts, Duration::from_secs(5)),
            || operation.execute(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(operation.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO, "no delay for a single attempt");
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_stops_early() {
    let calls = std::sync::atomic::AtomicUsize::new(0);

    let result: Result<(), GovernanceError> = with_retry_if(
        &RetryConfig::new(5, Duration::from_millis(10)),
        || async {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(GovernanceError::Upstream {
                status: 401,
                message: "invalid key".to_string(),
            })
        },
        GovernanceError::is_retryable,
    )
    .await;

    assert!(matches!(result, Err(GovernanceError::Upstream { status: 401, .. })));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retryable_errors_keep_retrying() {
    let operation = FlakyOperation::failing_times(1);
    let result = with_retry_if(
        &RetryConfig::new(3, Duration::from_millis(10)),
        || operation.execute(),
        GovernanceError::is_retryable,
    )
    .await;

    assert_ok!(result);
    assert_eq!(operation.calls(), 2);
}
