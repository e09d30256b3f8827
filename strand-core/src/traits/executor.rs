//! Op executor trait.

use super::MemoryManager;
use crate::error::Result;
use crate::value::{ArrayDescriptor, Tensor, Value};

/// Everything an executor learns about the op instance it runs.
pub struct OpContext<'a> {
    /// Op name.
    pub op: &'a str,
    /// Kernel name.
    pub kernel: &'a str,
    /// Frame the op runs in.
    pub frame: &'a str,
    /// Iteration within the frame.
    pub iteration: u32,
    /// Memory manager for output allocation.
    pub memory: &'a dyn MemoryManager,
}

impl OpContext<'_> {
    /// Allocate an output array through the memory manager.
    pub fn allocate(&self, desc: &ArrayDescriptor) -> Result<Tensor> {
        self.memory.allocate(desc)
    }
}

/// Runs ordinary (non control-flow) ops.
///
/// `inputs` are the resolved input values in declaration order. The returned
/// vector must hold one value per declared output.
pub trait OpExecutor: Send + Sync {
    /// Execute one op instance.
    fn execute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>>;
}
