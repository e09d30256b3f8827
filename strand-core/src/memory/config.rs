//! Memory manager configuration.

use std::env;

/// Configuration for [`ArrayCacheMemoryManager`](super::ArrayCacheMemoryManager).
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Whether released arrays are kept for reuse.
    pub cache_enabled: bool,
    /// Upper bound on bytes held in the cache.
    pub max_cache_bytes: usize,
    /// Arrays at or below this many bytes are cached even when the cache is full.
    pub small_array_threshold: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_cache_bytes: 64 * 1024 * 1024,
            small_array_threshold: 1024,
        }
    }
}

impl MemoryConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STRAND_MEMORY_CACHE`: "false" or "0" disables caching
    /// - `STRAND_MEMORY_CACHE_BYTES`: maximum cached bytes
    /// - `STRAND_SMALL_ARRAY_THRESHOLD`: always-cached size in bytes
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_enabled: env::var("STRAND_MEMORY_CACHE")
                .map(|s| !(s.eq_ignore_ascii_case("false") || s == "0"))
                .unwrap_or(defaults.cache_enabled),
            max_cache_bytes: env::var("STRAND_MEMORY_CACHE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_cache_bytes),
            small_array_threshold: env::var("STRAND_SMALL_ARRAY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.small_array_threshold),
        }
    }

    /// Disable caching.
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Set the cache size bound.
    pub fn with_max_cache_bytes(mut self, bytes: usize) -> Self {
        self.max_cache_bytes = bytes;
        self
    }

    /// Set the always-cached size.
    pub fn with_small_array_threshold(mut self, bytes: usize) -> Self {
        self.small_array_threshold = bytes;
        self
    }
}
