// for error definitions
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::Environment;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GovernanceError {
    /// The provider refused the call because we are sending too much
    #[error("Provider rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// A remote call did not finish within its deadline
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, reset by peer
    #[error("Network error: {0}")]
    Network(String),

    /// Errors reported by the persistence collaborator
    #[error("Database error: {0}")]
    Database(String),

    /// Non-success HTTP status from the provider
    #[error("Upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Every configured credential slot is unusable
    #[error("No API key available: {0}")]
    NoAvailableKey(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse buckets used to pick a user-facing status and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    RateLimit,
    Timeout,
    Network,
    Database,
    ExhaustedCredentials,
    Internal,
}

/// Severity attached to logged errors. Only affects observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl ErrorCategory {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorCategory::RateLimit => 429,
            ErrorCategory::Timeout => 504,
            ErrorCategory::Network => 503,
            ErrorCategory::Database
            | ErrorCategory::ExhaustedCredentials
            | ErrorCategory::Internal => 500,
        }
    }

    /// Message safe to show to end users in production
    pub fn public_message(self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "Too many requests. Please wait a moment and try again.",
            ErrorCategory::Timeout => {
                "The analysis service took too long to respond. Please try again."
            }
            ErrorCategory::Network => {
                "The analysis service is temporarily unreachable. Please try again shortly."
            }
            ErrorCategory::Database => "A storage error occurred. Please try again later.",
            ErrorCategory::ExhaustedCredentials => {
                "The analysis service is currently unavailable. Please try again later."
            }
            ErrorCategory::Internal => "An unexpected error occurred. Please try again later.",
        }
    }
}

impl GovernanceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GovernanceError::RateLimited { .. } => ErrorCategory::RateLimit,
            GovernanceError::Timeout(_) => ErrorCategory::Timeout,
            GovernanceError::Network(_) => ErrorCategory::Network,
            GovernanceError::Database(_) => ErrorCategory::Database,
            GovernanceError::Upstream { status, .. } => match status {
                429 => ErrorCategory::RateLimit,
                408 | 504 => ErrorCategory::Timeout,
                502 | 503 => ErrorCategory::Network,
                _ => ErrorCategory::Internal,
            },
            GovernanceError::NoAvailableKey(_) => ErrorCategory::ExhaustedCredentials,
            GovernanceError::Config(_) | GovernanceError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            GovernanceError::NoAvailableKey(_) | GovernanceError::Config(_) => Severity::Critical,
            GovernanceError::Database(_) | GovernanceError::Internal(_) => Severity::High,
            GovernanceError::Upstream { status, .. } if *status >= 500 => Severity::High,
            GovernanceError::RateLimited { .. }
            | GovernanceError::Timeout(_)
            | GovernanceError::Network(_)
            | GovernanceError::Upstream { .. } => Severity::Medium,
        }
    }

    /// Transient upstream failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            GovernanceError::Upstream { status, .. } => *status == 429 || *status >= 500,
            other => matches!(
                other.category(),
                ErrorCategory::RateLimit | ErrorCategory::Timeout | ErrorCategory::Network
            ),
        }
    }

    /// Whether this failure says the credential itself is the problem
    pub fn implicates_credential(&self) -> bool {
        match self {
            GovernanceError::RateLimited { .. } => true,
            GovernanceError::Upstream { status, .. } => matches!(status, 401 | 402 | 403 | 429),
            _ => false,
        }
    }

    /// Build an error from an HTTP status the provider answered with
    pub fn from_status(status: u16, body: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = body.into();
        match status {
            429 => GovernanceError::RateLimited {
                message,
                retry_after,
            },
            408 | 504 => GovernanceError::Timeout(message),
            _ => GovernanceError::Upstream { status, message },
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GovernanceError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// The `{message, statusCode}` pair handed to HTTP handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
    pub status_code: u16,
    pub retry_after_secs: Option<u64>,
}

impl ErrorResponse {
    /// Production hides raw error text; development appends it.
    pub fn from_error(err: &GovernanceError, environment: Environment) -> Self {
        let category = err.category();
        let message = match environment {
            Environment::Production => category.public_message().to_string(),
            Environment::Development => format!("{} ({})", category.public_message(), err),
        };

        Self {
            message,
            status_code: category.status_code(),
            retry_after_secs: err.retry_after().map(whole_secs_rounded_up),
        }
    }
}

// Retry-After never says 0 and never undershoots the hint
fn whole_secs_rounded_up(hint: Duration) -> u64 {
    let secs = hint.as_secs() + u64::from(hint.subsec_nanos() > 0);
    secs.max(1)
}

impl From<reqwest::Error> for GovernanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return GovernanceError::Timeout(err.to_string());
        }

        if let Some(status) = err.status() {
            return GovernanceError::from_status(status.as_u16(), err.to_string(), None);
        }

        if err.is_decode() || err.is_builder() {
            GovernanceError::Internal(err.to_string())
        } else {
            // connect, request and body failures
            GovernanceError::Network(err.to_string())
        }
    }
}

// implement conversions from serde_json::Error to GovernanceError
impl From<serde_json::Error> for GovernanceError {
    fn from(err: serde_json::Error) -> Self {
        GovernanceError::Internal(format!("Data serialization error: {}", err))
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, GovernanceError>;
