//! Array lifetimes.
//!
//! A second [`DependencyTracker`](strand_core::dependency::DependencyTracker)
//! keyed by array identity decides when an intermediate array has no reader
//! left and can be returned to the memory manager.
//!
//! Obligations registered for a produced value, per consumer:
//!
//! | Consumer | Obligation |
//! |---|---|
//! | ordinary op | `OpConsumer` in the same frame and iteration |
//! | NextIteration | `OpConsumer` at the next iteration |
//! | Exit | `OpConsumer` in the parent frame |
//! | loop-invariant Enter | `EndOfRun` |
//! | the caller (requested output) | `RequestedOutput` |
//!
//! Placeholders, constants and variables carry a holder obligation that is
//! never satisfied, so their arrays are never released here.

mod dep;
mod tracker;

pub use dep::Dep;
pub use tracker::ArrayLifecycleTracker;
