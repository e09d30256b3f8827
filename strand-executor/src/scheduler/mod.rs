//! Frame and iteration aware graph scheduler.
//!
//! This module provides the scheduling and execution infrastructure:
//! - [`Session`] - Runs requests against one graph
//! - [`Subgraph`] - The part of the graph a request can reach
//! - [`Resolver`] - Maps variable references to steps and value keys
//! - [`ValueStore`] - Values keyed by variable, frame and iteration
//! - Native dispatch of Merge, Switch, Enter, Exit, NextIteration and LoopCond

mod control_flow;
mod resolve;
mod session;
mod state;
mod store;
mod subgraph;

pub use control_flow::{Branch, StepEdge};
pub use resolve::{Resolved, Resolver};
pub use session::Session;
pub use state::SessionState;
pub use store::ValueStore;
pub use subgraph::Subgraph;
