//! Mock memory manager.

use crate::error::Result;
use crate::traits::MemoryManager;
use crate::types::ArrayId;
use crate::value::{ArrayDescriptor, Tensor};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct MockState {
    allocated: Vec<ArrayId>,
    releases: HashMap<ArrayId, usize>,
    release_order: Vec<ArrayId>,
}

/// Memory manager that records every call.
///
/// Unlike the real managers it accepts repeated releases of the same array,
/// counting them, so tests can assert that none happened.
#[derive(Debug, Default)]
pub struct MockMemoryManager {
    state: Mutex<MockState>,
}

impl MockMemoryManager {
    /// Create a mock with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `allocate` calls.
    pub fn allocation_count(&self) -> usize {
        self.state.lock().allocated.len()
    }

    /// Identities handed out by `allocate`, in order.
    pub fn allocated(&self) -> Vec<ArrayId> {
        self.state.lock().allocated.clone()
    }

    /// Number of `release` calls.
    pub fn release_count(&self) -> usize {
        self.state.lock().release_order.len()
    }

    /// How many times `id` was released.
    pub fn releases_of(&self, id: ArrayId) -> usize {
        self.state.lock().releases.get(&id).copied().unwrap_or(0)
    }

    /// Whether `id` was released at least once.
    pub fn was_released(&self, id: ArrayId) -> bool {
        self.releases_of(id) > 0
    }

    /// Released identities, in release order.
    pub fn released(&self) -> Vec<ArrayId> {
        self.state.lock().release_order.clone()
    }

    /// Identities released more than once.
    pub fn double_releases(&self) -> Vec<ArrayId> {
        let state = self.state.lock();
        let mut ids: Vec<ArrayId> = state
            .releases
            .iter()
            .filter(|&(_, &n)| n > 1)
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// Forget every recorded call.
    pub fn reset(&self) {
        *self.state.lock() = MockState::default();
    }
}

impl MemoryManager for MockMemoryManager {
    fn allocate(&self, desc: &ArrayDescriptor) -> Result<Tensor> {
        let tensor = Tensor::zeros(desc);
        self.state.lock().allocated.push(tensor.id());
        Ok(tensor)
    }

    fn release(&self, tensor: &Tensor) -> Result<()> {
        let mut state = self.state.lock();
        *state.releases.entry(tensor.id()).or_insert(0) += 1;
        state.release_order.push(tensor.id());
        Ok(())
    }
}
