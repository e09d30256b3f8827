//! Memory managers.
//!
//! [`ArrayCacheMemoryManager`] is the default: it recycles released arrays of
//! matching type and shape. [`DirectMemoryManager`] never caches.

mod cache;
mod config;
mod direct;

pub use cache::{ArrayCacheMemoryManager, CacheStats};
pub use config::MemoryConfig;
pub use direct::DirectMemoryManager;
