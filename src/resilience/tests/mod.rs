// src/resilience/tests/mod.rs
//! Tests for retry features

mod retry_tests;

// Common test utilities for resilience testing
pub(crate) mod utils {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::GovernanceError;

    /// Operation stand-in that fails a fixed number of times, then succeeds
    #[derive(Debug, Default)]
    pub struct FlakyOperation {
        pub calls: AtomicUsize,
        pub failures_before_success: Option<usize>,
    }

    impl FlakyOperation {
        pub fn failing_times(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_before_success: Some(failures),
            }
        }

        pub fn always_failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_before_success: None,
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub async fn execute(&self) -> Result<&'static str, GovernanceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.failures_before_success {
                Some(limit) if call > limit => Ok("scored"),
                _ => Err(GovernanceError::Network(format!("Simulated failure {}", call))),
            }
        }
    }
}
