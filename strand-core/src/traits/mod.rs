//! Collaborator traits.
//!
//! The scheduler does not compute anything itself. It depends on:
//! - `OpExecutor`: runs ordinary ops
//! - `MemoryManager`: hands out and takes back array storage

mod executor;
mod memory;

pub use executor::{OpContext, OpExecutor};
pub use memory::MemoryManager;
