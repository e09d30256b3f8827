//! Strand Executor - Graph scheduler with frames and iterations.
//!
//! This crate provides the execution infrastructure for strand:
//! - Session scheduler that unrolls loops and routes Switch branches on demand
//! - Native Merge, Switch, Enter, Exit, NextIteration and LoopCond dispatch
//! - Array lifecycle tracking that releases arrays after their last consumer
//! - Execution listeners and run reports
//! - Structured logging setup

#![warn(missing_docs)]

pub mod config;
pub mod lifecycle;
pub mod listener;
pub mod observability;
pub mod report;
pub mod scheduler;
pub mod testing;

pub use config::SessionConfig;
pub use report::{ExecutedStep, RunReport, RunStats};
pub use scheduler::{Session, SessionState};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::lifecycle::{ArrayLifecycleTracker, Dep};
    pub use crate::listener::{ListenerId, SessionListener};
    pub use crate::observability::{LogFormat, TracingConfig, TracingGuard, init_tracing};
    pub use crate::report::{ExecutedStep, RunReport, RunStats};
    pub use crate::scheduler::{Resolver, Session, SessionState, Subgraph, ValueStore};
    pub use crate::testing::RecordingListener;
}
