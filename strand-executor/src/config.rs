//! Session configuration.

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Prefer a ready step in the frame and iteration of the step just
    /// executed, falling back to FIFO order.
    ///
    /// Keeps a loop body moving through one iteration at a time instead of
    /// interleaving iterations, which shortens the lifetime of intermediates.
    pub prefer_current_frame: bool,
    /// Maximum number of missing names listed in a stall error.
    pub max_reported_missing: usize,
    /// Release a produced array at once when nothing consumes it and it was
    /// not requested.
    pub release_unused_outputs: bool,
    /// Keep the per-run execution log.
    pub record_execution: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefer_current_frame: true,
            max_reported_missing: 10,
            release_unused_outputs: true,
            record_execution: true,
        }
    }
}

impl SessionConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `STRAND_PREFER_CURRENT_FRAME`: Prefer steps in the current frame
    /// - `STRAND_MAX_REPORTED_MISSING`: Names listed in a stall error
    /// - `STRAND_RELEASE_UNUSED`: Release unconsumed outputs immediately
    /// - `STRAND_RECORD_EXECUTION`: Keep the execution log
    ///
    /// Unset or unparsable variables keep their defaults.
    ///
    /// # Example
    ///
    /// ```bash
    /// export STRAND_PREFER_CURRENT_FRAME=false
    /// export STRAND_MAX_REPORTED_MISSING=25
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let prefer_current_frame = std::env::var("STRAND_PREFER_CURRENT_FRAME")
            .ok()
            .and_then(|s| parse_flag(&s))
            .unwrap_or(defaults.prefer_current_frame);

        let max_reported_missing = std::env::var("STRAND_MAX_REPORTED_MISSING")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_reported_missing);

        let release_unused_outputs = std::env::var("STRAND_RELEASE_UNUSED")
            .ok()
            .and_then(|s| parse_flag(&s))
            .unwrap_or(defaults.release_unused_outputs);

        let record_execution = std::env::var("STRAND_RECORD_EXECUTION")
            .ok()
            .and_then(|s| parse_flag(&s))
            .unwrap_or(defaults.record_execution);

        Self {
            prefer_current_frame,
            max_reported_missing,
            release_unused_outputs,
            record_execution,
        }
    }

    /// Set whether the current frame is preferred when dequeuing.
    pub fn with_prefer_current_frame(mut self, prefer: bool) -> Self {
        self.prefer_current_frame = prefer;
        self
    }

    /// Set how many missing names a stall error lists.
    pub fn with_max_reported_missing(mut self, max: usize) -> Self {
        self.max_reported_missing = max;
        self
    }

    /// Set whether unconsumed outputs are released immediately.
    pub fn with_release_unused_outputs(mut self, release: bool) -> Self {
        self.release_unused_outputs = release;
        self
    }

    /// Set whether the execution log is kept.
    pub fn with_record_execution(mut self, record: bool) -> Self {
        self.record_execution = record;
        self
    }
}

pub(crate) fn parse_flag(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
