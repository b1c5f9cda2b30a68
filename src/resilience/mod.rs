// src/resilience/mod.rs
//! Retry support for calls to the LLM provider.
//!
//! 1. **Exponential backoff** - delay schedule `base * multiplier^attempt`
//! 2. **Retry executor** - bounded re-invocation of a fallible async operation

mod exponential_backoff;
mod retry;

#[cfg(test)]
mod tests;

// Re-export key components
pub use exponential_backoff::{ExponentialBackoff, RetryConfig};
pub use retry::{with_retry, with_retry_if};
