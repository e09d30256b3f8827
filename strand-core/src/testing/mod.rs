//! Test doubles for the collaborator traits.

mod memory;

pub use memory::MockMemoryManager;
