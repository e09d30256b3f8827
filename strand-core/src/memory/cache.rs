//! Caching memory manager.
//!
//! Released arrays are kept in per-(type, shape) pools and handed out again
//! by `allocate` with a new identity, once nothing else shares their buffer.
//! The oldest cached arrays are evicted once the cache exceeds its byte
//! bound, except small arrays which are always kept.

use super::MemoryConfig;
use crate::error::{Result, StrandError};
use crate::traits::MemoryManager;
use crate::types::ArrayId;
use crate::value::{ArrayDescriptor, Tensor};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;

/// Counters reported by [`ArrayCacheMemoryManager::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// `allocate` calls.
    pub allocations: u64,
    /// `allocate` calls served from the cache.
    pub cache_hits: u64,
    /// `release` calls accepted.
    pub releases: u64,
    /// Arrays dropped from the cache to respect the byte bound.
    pub evictions: u64,
    /// Bytes currently cached.
    pub cached_bytes: usize,
    /// Arrays currently cached.
    pub cached_arrays: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    pools: HashMap<ArrayDescriptor, Vec<Tensor>>,
    /// Cached identities, oldest first.
    order: VecDeque<(ArrayId, ArrayDescriptor)>,
    outstanding: HashSet<ArrayId>,
    stats: CacheStats,
}

impl CacheState {
    /// Newest cached array of `desc` whose buffer no other handle shares.
    fn take(&mut self, desc: &ArrayDescriptor) -> Option<Tensor> {
        let pool = self.pools.get_mut(desc)?;
        let position = pool.iter().rposition(Tensor::is_unique)?;
        let tensor = pool.remove(position);
        self.order.retain(|(id, _)| *id != tensor.id());
        self.stats.cached_bytes -= desc.byte_size();
        self.stats.cached_arrays -= 1;
        Some(tensor)
    }

    fn evict_oldest(&mut self, small_array_threshold: usize) -> bool {
        let Some(position) = self
            .order
            .iter()
            .position(|(_, desc)| desc.byte_size() > small_array_threshold)
        else {
            return false;
        };
        let Some((id, desc)) = self.order.remove(position) else {
            return false;
        };
        if let Some(pool) = self.pools.get_mut(&desc) {
            pool.retain(|t| t.id() != id);
        }
        self.stats.cached_bytes -= desc.byte_size();
        self.stats.cached_arrays -= 1;
        self.stats.evictions += 1;
        trace!(array = %id, desc = %desc, "evicted cached array");
        true
    }
}

/// Memory manager that recycles released arrays.
#[derive(Debug)]
pub struct ArrayCacheMemoryManager {
    config: MemoryConfig,
    state: Mutex<CacheState>,
}

impl ArrayCacheMemoryManager {
    /// Create a manager with the given configuration.
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Number of handed-out arrays not yet released.
    pub fn outstanding_count(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    /// Drop every cached array.
    pub fn clear_cache(&self) {
        let mut state = self.state.lock();
        state.pools.clear();
        state.order.clear();
        state.stats.cached_bytes = 0;
        state.stats.cached_arrays = 0;
    }
}

impl Default for ArrayCacheMemoryManager {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl MemoryManager for ArrayCacheMemoryManager {
    fn allocate(&self, desc: &ArrayDescriptor) -> Result<Tensor> {
        let mut state = self.state.lock();
        state.stats.allocations += 1;
        let reused = if self.config.cache_enabled {
            state.take(desc)
        } else {
            None
        };
        let tensor = match reused {
            Some(cached) => {
                state.stats.cache_hits += 1;
                cached.reissue()
            }
            None => Tensor::zeros(desc),
        };
        state.outstanding.insert(tensor.id());
        Ok(tensor)
    }

    fn release(&self, tensor: &Tensor) -> Result<()> {
        let mut state = self.state.lock();
        if !state.outstanding.remove(&tensor.id()) {
            return Err(StrandError::DoubleRelease { array: tensor.id() });
        }
        state.stats.releases += 1;
        if !self.config.cache_enabled {
            return Ok(());
        }

        let desc = tensor.descriptor().clone();
        let size = desc.byte_size();
        let small = size <= self.config.small_array_threshold;
        if !small && size > self.config.max_cache_bytes {
            return Ok(());
        }

        state.order.push_back((tensor.id(), desc.clone()));
        state.pools.entry(desc).or_default().push(tensor.clone());
        state.stats.cached_bytes += size;
        state.stats.cached_arrays += 1;

        while state.stats.cached_bytes > self.config.max_cache_bytes {
            if !state.evict_oldest(self.config.small_array_threshold) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    fn desc(n: usize) -> ArrayDescriptor {
        ArrayDescriptor::new(DataType::Float64, vec![n])
    }

    #[test]
    fn released_arrays_are_reused_with_new_identity() {
        let mm = ArrayCacheMemoryManager::default();
        let first = mm.allocate(&desc(4)).unwrap();
        let (first_id, buffer) = (first.id(), first.data().as_ptr());
        mm.release(&first).unwrap();
        drop(first);

        let mut second = mm.allocate(&desc(4)).unwrap();
        let second_id = second.id();
        assert_ne!(first_id, second_id);
        assert_eq!(second.shape(), &[4]);
        second.data_mut()[0] = 1.0;
        assert_eq!(second.data().as_ptr(), buffer);
        assert_eq!(second.id(), second_id);

        let stats = mm.stats();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cached_arrays, 0);
    }

    #[test]
    fn shared_buffers_wait_in_the_cache() {
        let mm = ArrayCacheMemoryManager::default();
        let held = mm.allocate(&desc(2)).unwrap();
        mm.release(&held).unwrap();

        mm.allocate(&desc(2)).unwrap();
        assert_eq!(mm.stats().cache_hits, 0);
        assert_eq!(mm.stats().cached_arrays, 1);

        drop(held);
        mm.allocate(&desc(2)).unwrap();
        assert_eq!(mm.stats().cache_hits, 1);
        assert_eq!(mm.stats().cached_arrays, 0);
    }

    #[test]
    fn only_outstanding_arrays_are_remembered() {
        let mm = ArrayCacheMemoryManager::default();
        for _ in 0..3 {
            let a = mm.allocate(&desc(3)).unwrap();
            assert_eq!(mm.outstanding_count(), 1);
            mm.release(&a).unwrap();
        }
        assert_eq!(mm.outstanding_count(), 0);
        assert!(matches!(
            mm.release(&Tensor::scalar(1.0)),
            Err(StrandError::DoubleRelease { .. })
        ));
    }

    #[test]
    fn shape_must_match_for_reuse() {
        let mm = ArrayCacheMemoryManager::default();
        let a = mm.allocate(&desc(4)).unwrap();
        mm.release(&a).unwrap();
        mm.allocate(&desc(5)).unwrap();
        assert_eq!(mm.stats().cache_hits, 0);
        assert_eq!(mm.stats().cached_arrays, 1);
    }

    #[test]
    fn double_release_is_rejected() {
        let mm = ArrayCacheMemoryManager::default();
        let a = mm.allocate(&desc(1)).unwrap();
        mm.release(&a).unwrap();
        assert!(matches!(
            mm.release(&a),
            Err(StrandError::DoubleRelease { array }) if array == a.id()
        ));
    }

    #[test]
    fn oldest_large_arrays_are_evicted() {
        let config = MemoryConfig::default()
            .with_max_cache_bytes(100)
            .with_small_array_threshold(16);
        let mm = ArrayCacheMemoryManager::new(config);

        let a = mm.allocate(&desc(10)).unwrap();
        let b = mm.allocate(&desc(10)).unwrap();
        let small = mm.allocate(&desc(1)).unwrap();
        mm.release(&small).unwrap();
        mm.release(&a).unwrap();
        mm.release(&b).unwrap();

        let stats = mm.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.cached_arrays, 2);
        assert_eq!(stats.cached_bytes, 88);

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["evictions"], 1);
    }

    #[test]
    fn disabled_cache_never_reuses() {
        let mm = ArrayCacheMemoryManager::new(MemoryConfig::default().without_cache());
        let a = mm.allocate(&desc(2)).unwrap();
        mm.release(&a).unwrap();
        mm.allocate(&desc(2)).unwrap();
        assert_eq!(mm.stats().cache_hits, 0);
        assert_eq!(mm.stats().cached_bytes, 0);
    }

    #[test]
    fn clear_cache_drops_pools() {
        let mm = ArrayCacheMemoryManager::default();
        let a = mm.allocate(&desc(2)).unwrap();
        mm.release(&a).unwrap();
        mm.clear_cache();
        assert_eq!(mm.stats().cached_arrays, 0);
        mm.allocate(&desc(2)).unwrap();
        assert_eq!(mm.stats().cache_hits, 0);
    }
}
