// library entry
pub mod cache;
pub mod config;
pub mod error;
pub mod governor;
pub mod keys;
pub mod limiter;
pub mod logging;
pub mod resilience;
pub mod sweeper;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

// Re-export key components for convenience
pub use cache::TtlCache;
pub use config::GovernanceConfig;
pub use error::{ErrorResponse, GovernanceError, Result};
pub use governor::{Governed, RequestGovernor};
pub use keys::{KeyManager, SelectedKey};
pub use limiter::{FixedWindowLimiter, RateLimitStatus};
pub use logging::init as init_logging;
