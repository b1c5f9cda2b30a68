// src/tests/error_tests.rs

use std::time::Duration;

use crate::config::Environment;
use crate::error::{ErrorCategory, ErrorResponse, GovernanceError, Severity};

fn upstream(status: u16) -> GovernanceError {
    GovernanceError::from_status(status, "provider said no", None)
}

#[test]
fn test_status_classification() {
    let cases = [
        (upstream(429), ErrorCategory::RateLimit, 429),
        (upstream(408), ErrorCategory::Timeout, 504),
        (upstream(504), ErrorCategory::Timeout, 504),
        (upstream(503), ErrorCategory::Network, 503),
        (upstream(500), ErrorCategory::Internal, 500),
        (
            GovernanceError::Database("disk full".to_string()),
            ErrorCategory::Database,
            500,
        ),
        (
            GovernanceError::NoAvailableKey("all slots down".to_string()),
            ErrorCategory::ExhaustedCredentials,
            500,
        ),
    ];

    for (err, category, status) in cases {
        assert_eq!(err.category(), category, "category of {}", err);
        assert_eq!(err.category().status_code(), status, "status of {}", err);
    }
}

#[test]
fn test_too_many_requests_keeps_retry_hint() {
    let err = GovernanceError::from_status(429, "slow down", Some(Duration::from_secs(30)));
    assert!(matches!(err, GovernanceError::RateLimited { .. }));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));

    let response = ErrorResponse::from_error(&err, Environment::Production);
    assert_eq!(response.status_code, 429);
    assert_eq!(response.retry_after_secs, Some(30));
}

#[test]
fn test_retryable_and_credential_failures() {
    assert!(GovernanceError::Network("reset".to_string()).is_retryable());
    assert!(GovernanceError::Timeout("slow".to_string()).is_retryable());
    assert!(upstream(502).is_retryable());
    assert!(upstream(429).is_retryable());
    assert!(!upstream(401).is_retryable());
    assert!(!GovernanceError::Config("bad".to_string()).is_retryable());

    assert!(upstream(401).implicates_credential());
    assert!(upstream(402).implicates_credential());
    assert!(upstream(429).implicates_credential());
    assert!(!upstream(500).implicates_credential());
    assert!(!GovernanceError::Network("reset".to_string()).implicates_credential());
}

#[test]
fn test_severity() {
    assert_eq!(
        GovernanceError::NoAvailableKey(String::new()).severity(),
        Severity::Critical
    );
    assert_eq!(upstream(503).severity(), Severity::High);
    assert_eq!(upstream(404).severity(), Severity::Medium);
    assert!(Severity::Critical > Severity::Low);
    assert_eq!(Severity::High.to_string(), "high");
}

#[test]
fn test_production_hides_raw_text() {
    let err = GovernanceError::Database("password authentication failed for user app".to_string());

    let production = ErrorResponse::from_error(&err, Environment::Production);
    assert!(!production.message.contains("password"));
    assert_eq!(production.retry_after_secs, None);

    let development = ErrorResponse::from_error(&err, Environment::Development);
    assert!(development.message.contains("password authentication failed"));
    assert_eq!(development.status_code, production.status_code);
}

#[test]
fn test_json_errors_are_internal() {
    let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err = GovernanceError::from(parse);
    assert_eq!(err.category(), ErrorCategory::Internal);
    assert!(err.to_string().contains("Data serialization error"));
}

#[test]
fn test_retry_hint_rounds_up_to_whole_seconds() {
    let hint = |millis: u64| {
        let err = GovernanceError::from_status(429, "slow down", Some(Duration::from_millis(millis)));
        ErrorResponse::from_error(&err, Environment::Production).retry_after_secs
    };

    assert_eq!(hint(1_500), Some(2));
    assert_eq!(hint(200), Some(1));
    assert_eq!(hint(0), Some(1));
    assert_eq!(hint(3_000), Some(3));
}
