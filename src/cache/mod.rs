// src/cache/mod.rs
//! In-memory response cache with per-entry expiry.
//!
//! Used to memoize expensive, idempotent remote calls. The cache never fails:
//! a miss is a value (`None`), and errors from the wrapped work in
//! [`TtlCache::with_cache`] pass straight through without being stored.

mod ttl_cache;

#[cfg(test)]
mod tests;

pub use ttl_cache::{CacheStats, TtlCache};

/// Join request parameters into the canonical `"kind:a:b"` cache key
pub fn cache_key<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(":")
}
