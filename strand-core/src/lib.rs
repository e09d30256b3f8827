//! Strand Core Library
//!
//! This crate provides the foundational types and traits of the strand
//! graph executor.
//!
//! # Overview
//!
//! Strand runs computation graphs that contain conditionals and loops. Ops
//! are scheduled strictly by their data and control dependencies across
//! nested loop frames, and intermediate arrays are released as soon as no
//! consumer needs them.
//!
//! # Key Components
//!
//! - **Dependency**: Generic AND/OR dependency tracker with a ready queue
//! - **Types**: Interned names, the frame arena, execution steps
//! - **Graph**: Immutable graph model and its builder
//! - **Traits**: Op executor and memory manager collaborators
//! - **Memory**: Caching and direct memory managers
//!
//! # Example
//!
//! ```
//! use strand_core::prelude::*;
//!
//! let mut tracker: DependencyTracker<&str, &str> = DependencyTracker::default();
//! tracker.add_dependency("y", "x");
//! tracker.mark_satisfied("x", true);
//! assert_eq!(tracker.get_new_all_satisfied().unwrap(), "y");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dependency;
pub mod error;
pub mod graph;
pub mod memory;
pub mod prelude;
pub mod testing;
pub mod traits;
pub mod types;
pub mod value;

// Re-export key types at crate root for convenience
pub use dependency::{DependencyTracker, Edge};
pub use error::{Result, StrandError};
pub use graph::{Graph, GraphBuilder, OpNode, OpType, Variable, VariableKind};
pub use traits::{MemoryManager, OpContext, OpExecutor};
pub use types::{ArrayId, ExecKind, ExecStep, FrameIter, FrameIterId, NameId, VarId};
pub use value::{ArrayDescriptor, DataType, Tensor, Value};
