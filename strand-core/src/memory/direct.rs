//! Non-caching memory manager.

use crate::error::{Result, StrandError};
use crate::traits::MemoryManager;
use crate::types::ArrayId;
use crate::value::{ArrayDescriptor, Tensor};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates fresh zeroed arrays and forgets released ones.
///
/// Only identities still outstanding are remembered. Releasing an array that
/// is not outstanding, whether released already or never allocated here, is
/// reported instead of silently accepted.
#[derive(Debug, Default)]
pub struct DirectMemoryManager {
    outstanding: Mutex<HashSet<ArrayId>>,
    allocations: AtomicU64,
    releases: AtomicU64,
}

impl DirectMemoryManager {
    /// Create a manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `allocate` calls served.
    pub fn allocation_count(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Number of successful `release` calls.
    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Number of allocated arrays not yet released.
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.lock().len()
    }
}

impl MemoryManager for DirectMemoryManager {
    fn allocate(&self, desc: &ArrayDescriptor) -> Result<Tensor> {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let tensor = Tensor::zeros(desc);
        self.outstanding.lock().insert(tensor.id());
        Ok(tensor)
    }

    fn release(&self, tensor: &Tensor) -> Result<()> {
        if !self.outstanding.lock().remove(&tensor.id()) {
            return Err(StrandError::DoubleRelease { array: tensor.id() });
        }
        self.releases.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
