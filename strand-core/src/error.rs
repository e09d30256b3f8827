//! Error types for strand.
//!
//! Every error carries a stable code in its message and enough context
//! (op, variable, frame) to locate the failure in the graph. Nothing is
//! retried: a run that fails must be cleared before the session is reused.

use crate::types::ArrayId;
use thiserror::Error;

/// The main error type for strand operations.
#[derive(Error, Debug)]
pub enum StrandError {
    // =========================================================================
    // Input Validation Errors (E101-E199)
    // =========================================================================
    /// No outputs were requested.
    #[error("E101: At least one output must be requested")]
    EmptyRequest,

    /// A requested output or required variable is not in the graph.
    #[error("E102: Requested output {name} is not a variable in the graph")]
    UnknownOutput {
        /// The requested name.
        name: String,
    },

    /// A placeholder needed by the run has no supplied value.
    #[error("E103: No value supplied for required placeholder {name}")]
    MissingPlaceholder {
        /// The placeholder name.
        name: String,
    },

    /// A value was supplied for a name that is not a placeholder.
    #[error("E104: Value supplied for {name}, which is not a placeholder in the graph")]
    UnknownPlaceholder {
        /// The supplied name.
        name: String,
    },

    // =========================================================================
    // Execution Errors (E201-E299)
    // =========================================================================
    /// The ready queue emptied while requested outputs were still missing.
    #[error(
        "E201: No variable are available for execution at step {step}: {missing_outputs} requested output values remaining, {missing_required} required values remaining; missing: [{}]{}",
        missing.join(", "),
        if *truncated { ", ..." } else { "" }
    )]
    ExecutionStall {
        /// Number of steps dispatched before the stall.
        step: usize,
        /// Requested outputs not produced.
        missing_outputs: usize,
        /// Requested outputs plus extra required variables not produced.
        missing_required: usize,
        /// Names of missing variables, capped.
        missing: Vec<String>,
        /// Whether `missing` was capped.
        truncated: bool,
    },

    // =========================================================================
    // Structural Errors (E301-E399)
    // =========================================================================
    /// An op name does not exist in the graph.
    #[error("E301: Unknown op {name}")]
    UnknownOp {
        /// The op name.
        name: String,
    },

    /// A variable name does not exist in the graph.
    #[error("E302: Unknown variable {name}")]
    UnknownVariable {
        /// The variable name.
        name: String,
    },

    /// A Merge was dispatched with neither input available.
    #[error("E303: Merge {op} has no available input in frame {frame}")]
    MergeNoInputs {
        /// The Merge op.
        op: String,
        /// Frame the Merge ran in.
        frame: String,
    },

    /// A Switch or LoopCond predicate is not a boolean scalar.
    #[error("E304: Predicate of {op} must be a boolean scalar: {cause}")]
    InvalidPredicate {
        /// The op.
        op: String,
        /// What was found instead.
        cause: String,
    },

    /// A value an op needs is not stored for the frame it runs in.
    #[error("E305: Op {op} needs {variable} in frame {frame}, but no value is stored")]
    MissingFrameValue {
        /// The op.
        op: String,
        /// The input variable.
        variable: String,
        /// Frame the value was looked up in.
        frame: String,
    },

    /// A Switch output occupies an index other than 0 or 1.
    #[error("E306: Variable {variable} is output {index} of Switch {op}; only 0 and 1 exist")]
    InvalidSwitchOutput {
        /// The Switch op.
        op: String,
        /// The output variable.
        variable: String,
        /// Its output index.
        index: usize,
    },

    /// An op has the wrong number of inputs or outputs.
    #[error("E307: Op {op} expects {expected} {what}, got {actual}")]
    OpArity {
        /// The op.
        op: String,
        /// "inputs" or "outputs".
        what: &'static str,
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },

    /// An Exit ran in a frame with no parent.
    #[error("E308: Op {op} leaves frame {frame}, which has no parent frame")]
    MissingParentFrame {
        /// The op.
        op: String,
        /// The frame.
        frame: String,
    },

    /// A computed variable has no producing op.
    #[error("E309: Variable {variable} has no producing op")]
    NoProducer {
        /// The variable.
        variable: String,
    },

    /// The graph definition is inconsistent.
    #[error("E310: Invalid graph: {cause}")]
    InvalidTopology {
        /// What is wrong.
        cause: String,
    },

    /// A value was written twice for the same variable, frame and iteration.
    #[error("E311: Value for {variable} in frame {frame} was already written")]
    ValueOverwrite {
        /// The variable.
        variable: String,
        /// The frame.
        frame: String,
    },

    /// A step kind that is never scheduled was dequeued.
    #[error("E312: Unexpected {kind} step {name} in the ready queue")]
    UnexpectedStep {
        /// Step kind.
        kind: String,
        /// Step name.
        name: String,
    },

    // =========================================================================
    // Kernel Errors (E401-E499)
    // =========================================================================
    /// An op kernel failed.
    #[error("E401: Op {op} failed: {cause}")]
    OpExecution {
        /// The op.
        op: String,
        /// Reason for the failure.
        cause: String,
    },

    /// No kernel is registered for an op type.
    #[error("E402: No kernel registered for {kernel} (op {op})")]
    UnsupportedOp {
        /// The op.
        op: String,
        /// The kernel name.
        kernel: String,
    },

    /// A kernel received inputs it cannot handle.
    #[error("E403: Invalid input to {op}: {cause}")]
    KernelInput {
        /// The op.
        op: String,
        /// What is wrong.
        cause: String,
    },

    /// Tensor data does not match its shape.
    #[error("E404: Invalid tensor: {cause}")]
    InvalidTensor {
        /// What is wrong.
        cause: String,
    },

    // =========================================================================
    // Tracker Errors (E501-E599)
    // =========================================================================
    /// A dequeue was attempted on an empty ready queue.
    #[error("E501: No new all-satisfied items in {tracker}; check has_new_all_satisfied() first")]
    NoReadyItems {
        /// Which tracker.
        tracker: &'static str,
    },

    // =========================================================================
    // Memory Errors (E601-E699)
    // =========================================================================
    /// An array was released that is not outstanding: it was released
    /// already or never came from this manager.
    #[error("E601: Array {array} was released more than once or never allocated")]
    DoubleRelease {
        /// The array identity.
        array: ArrayId,
    },

    /// An allocation could not be served.
    #[error("E602: Allocation failed: {cause}")]
    Allocation {
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Configuration Errors (E801-E899)
    // =========================================================================
    /// A configuration value is invalid.
    #[error("E801: Invalid configuration value for {field}: {cause}")]
    ConfigValue {
        /// The field.
        field: String,
        /// Reason it is invalid.
        cause: String,
    },

    // =========================================================================
    // State Errors (E901-E999)
    // =========================================================================
    /// An operation was called in the wrong session state.
    #[error("E901: Session is {actual}, expected {expected}")]
    InvalidState {
        /// States the operation accepts.
        expected: &'static str,
        /// Current state.
        actual: String,
    },
}

impl StrandError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyRequest => "E101",
            Self::UnknownOutput { .. } => "E102",
            Self::MissingPlaceholder { .. } => "E103",
            Self::UnknownPlaceholder { .. } => "E104",
            Self::ExecutionStall { .. } => "E201",
            Self::UnknownOp { .. } => "E301",
            Self::UnknownVariable { .. } => "E302",
            Self::MergeNoInputs { .. } => "E303",
            Self::InvalidPredicate { .. } => "E304",
            Self::MissingFrameValue { .. } => "E305",
            Self::InvalidSwitchOutput { .. } => "E306",
            Self::OpArity { .. } => "E307",
            Self::MissingParentFrame { .. } => "E308",
            Self::NoProducer { .. } => "E309",
            Self::InvalidTopology { .. } => "E310",
            Self::ValueOverwrite { .. } => "E311",
            Self::UnexpectedStep { .. } => "E312",
            Self::OpExecution { .. } => "E401",
            Self::UnsupportedOp { .. } => "E402",
            Self::KernelInput { .. } => "E403",
            Self::InvalidTensor { .. } => "E404",
            Self::NoReadyItems { .. } => "E501",
            Self::DoubleRelease { .. } => "E601",
            Self::Allocation { .. } => "E602",
            Self::ConfigValue { .. } => "E801",
            Self::InvalidState { .. } => "E901",
        }
    }

    /// Check if this error was raised before any op executed.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyRequest
                | Self::UnknownOutput { .. }
                | Self::MissingPlaceholder { .. }
                | Self::UnknownPlaceholder { .. }
        )
    }

    /// Check if this error points at a malformed graph or a scheduler bug.
    #[must_use]
    pub fn is_structural_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownOp { .. }
                | Self::UnknownVariable { .. }
                | Self::MergeNoInputs { .. }
                | Self::InvalidPredicate { .. }
                | Self::MissingFrameValue { .. }
                | Self::InvalidSwitchOutput { .. }
                | Self::OpArity { .. }
                | Self::MissingParentFrame { .. }
                | Self::NoProducer { .. }
                | Self::InvalidTopology { .. }
                | Self::ValueOverwrite { .. }
                | Self::UnexpectedStep { .. }
        )
    }

    /// Check if this error is a stall.
    #[must_use]
    pub fn is_stall(&self) -> bool {
        matches!(self, Self::ExecutionStall { .. })
    }
}

/// Result type alias using `StrandError`.
pub type Result<T> = std::result::Result<T, StrandError>;

/// Extension trait for adding op context to foreign errors.
pub trait ResultExt<T> {
    /// Wrap an error as a failure of the named op.
    fn with_op(self, op: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn with_op(self, op: &str) -> Result<T> {
        self.map_err(|e| StrandError::OpExecution {
            op: op.to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_correct() {
        let err = StrandError::UnknownOutput {
            name: "out".to_string(),
        };
        assert_eq!(err.code(), "E102");
        assert!(err.is_validation_error());
        assert!(!err.is_structural_error());
    }

    #[test]
    fn stall_message_lists_missing() {
        let err = StrandError::ExecutionStall {
            step: 4,
            missing_outputs: 2,
            missing_required: 3,
            missing: vec!["a".to_string(), "b".to_string()],
            truncated: false,
        };
        assert_eq!(
            err.to_string(),
            "E201: No variable are available for execution at step 4: 2 requested output values remaining, 3 required values remaining; missing: [a, b]"
        );
        assert!(err.is_stall());
    }

    #[test]
    fn stall_message_marks_truncation() {
        let err = StrandError::ExecutionStall {
            step: 0,
            missing_outputs: 12,
            missing_required: 12,
            missing: vec!["x".to_string()],
            truncated: true,
        };
        assert!(err.to_string().ends_with("missing: [x], ..."));
    }

    #[test]
    fn structural_errors() {
        let err = StrandError::MergeNoInputs {
            op: "merge".to_string(),
            frame: "main/0".to_string(),
        };
        assert_eq!(err.code(), "E303");
        assert!(err.is_structural_error());
    }

    #[test]
    fn result_ext_adds_op() {
        let r: std::result::Result<(), String> = Err("boom".to_string());
        let err = r.with_op("add").unwrap_err();
        assert_eq!(err.to_string(), "E401: Op add failed: boom");
    }
}
