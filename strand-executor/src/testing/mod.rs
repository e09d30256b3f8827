//! Testing utilities for session execution.
//!
//! This module provides `RecordingListener`, a [`SessionListener`] that
//! keeps every event it receives so tests can assert on which op instances
//! ran, in which frame and iteration, and in what order.
//!
//! # Example
//!
//! ```ignore
//! use strand_executor::testing::RecordingListener;
//!
//! let recorder = Arc::new(RecordingListener::new());
//! session.add_listener(recorder.clone());
//! session.run(&["out"], feeds, &[])?;
//!
//! assert_eq!(recorder.iterations_of("body_add"), vec![0, 1, 2]);
//! ```
//!
//! [`SessionListener`]: crate::listener::SessionListener

mod recorder;

pub use recorder::{Event, RecordingListener};
