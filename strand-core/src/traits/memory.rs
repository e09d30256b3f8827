//! Memory manager trait.

use crate::error::Result;
use crate::value::{ArrayDescriptor, Tensor};

/// Source and sink of array storage.
///
/// The scheduler calls `release` exactly once for every array whose last
/// consumer has finished. Implementations may recycle released storage for
/// later `allocate` calls, but must give recycled storage a fresh identity.
pub trait MemoryManager: Send + Sync {
    /// Allocate an array of the given type and shape. Contents are unspecified.
    fn allocate(&self, desc: &ArrayDescriptor) -> Result<Tensor>;

    /// Return an array. The caller holds no further claim on it.
    fn release(&self, tensor: &Tensor) -> Result<()>;
}
