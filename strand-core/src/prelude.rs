//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Example
//!
//! ```ignore
//! use strand_core::prelude::*;
//! ```

// Core types
pub use crate::types::{
    ArrayId, ExecKind, ExecStep, FrameArena, FrameIter, FrameIterId, NameId, NameTable, VarId,
};

// Error handling
pub use crate::error::{Result, ResultExt, StrandError};

// Dependency tracking
pub use crate::dependency::{DependencyList, DependencyTracker, Edge};

// Graph model
pub use crate::graph::{Graph, GraphBuilder, OpNode, OpType, Variable, VariableKind};

// Values
pub use crate::value::{ArrayDescriptor, DataType, Tensor, Value};

// Collaborators
pub use crate::memory::{ArrayCacheMemoryManager, DirectMemoryManager, MemoryConfig};
pub use crate::traits::{MemoryManager, OpContext, OpExecutor};
