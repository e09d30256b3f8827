//! Reference kernels for strand.
//!
//! This crate provides a [`KernelRegistry`] that implements
//! [`OpExecutor`](strand_core::traits::OpExecutor) over a small set of
//! numerical kernels. It stands in for a real kernel library in tests and
//! gives embedders a working default.
//!
//! ## Element-wise (`kernels::elementwise`)
//! - `identity` - Forwards its input, keeping array identity
//! - `copy` - Copies its input into a fresh array
//! - `neg` - Negation
//! - `add`, `sub`, `mul`, `div` - Arithmetic with scalar broadcasting
//!
//! ## Comparisons (`kernels::compare`)
//! - `less`, `less_equal`, `greater`, `equal` - Boolean results
//! - `logical_not` - Boolean negation
//!
//! ## Reductions and fills (`kernels::shape`)
//! - `sum` - Sum of every element, lists included
//! - `zeros_like`, `ones_like` - Filled arrays shaped like the input
//! - `pack` - List of the input arrays, keeping array identity
//!
//! Every new array is allocated through the memory manager of the op
//! context, so its release can be observed.

pub mod kernels;
pub mod registry;

pub use kernels::{BinaryOp, CompareOp, Fill, Identity, LogicalNot, Pack, Sum, UnaryOp};
pub use registry::{FnKernel, Kernel, KernelRegistry};

/// Prelude for commonly used types.
pub mod prelude {
    pub use crate::kernels::{BinaryOp, CompareOp, Fill, Identity, LogicalNot, Pack, Sum, UnaryOp};
    pub use crate::registry::{FnKernel, Kernel, KernelRegistry};
}
