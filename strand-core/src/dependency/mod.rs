//! Generic AND/OR dependency resolution.
//!
//! The scheduler uses one [`DependencyTracker`] keyed by execution steps to
//! decide which op instance may run next, and the array lifecycle tracker
//! uses a second one keyed by array identity to decide when a value may be
//! released.

mod tracker;

pub use tracker::{DependencyList, DependencyTracker, Edge};
