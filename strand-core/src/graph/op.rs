//! Op definitions.

use crate::types::NameId;

/// Control-flow tag of an op.
///
/// Control-flow ops are dispatched by the scheduler itself; everything else
/// is `Ordinary` and handed to the op executor under its kernel name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpType {
    /// Forwards whichever of its two inputs is available.
    Merge,
    /// Routes its data input to output 0 (predicate false) or 1 (predicate true).
    Switch,
    /// Moves its input into iteration 0 of a child frame.
    Enter {
        /// Name of the child frame.
        frame: NameId,
        /// Whether the value is loop-invariant and shared by every iteration.
        constant: bool,
    },
    /// Moves its input from a frame to the enclosing frame.
    Exit,
    /// Moves its input to the next iteration of the same frame.
    NextIteration,
    /// Passes a boolean scalar loop condition through.
    LoopCond,
    /// A numerical op executed by a kernel.
    Ordinary {
        /// Kernel name.
        kernel: String,
    },
}

impl OpType {
    /// An ordinary op using `kernel`.
    pub fn ordinary(kernel: impl Into<String>) -> Self {
        Self::Ordinary {
            kernel: kernel.into(),
        }
    }

    /// Whether the scheduler dispatches this op natively.
    #[must_use]
    pub fn is_control_flow(&self) -> bool {
        !matches!(self, Self::Ordinary { .. })
    }

    /// Short label for logs and listeners.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Merge => "merge",
            Self::Switch => "switch",
            Self::Enter { .. } => "enter",
            Self::Exit => "exit",
            Self::NextIteration => "next_iteration",
            Self::LoopCond => "loop_cond",
            Self::Ordinary { kernel } => kernel,
        }
    }

    /// (inputs, outputs) required for control-flow ops.
    pub(crate) fn fixed_arity(&self) -> Option<(usize, usize)> {
        match self {
            Self::Merge => Some((2, 1)),
            Self::Switch => Some((2, 2)),
            Self::Enter { .. } | Self::Exit | Self::NextIteration | Self::LoopCond => Some((1, 1)),
            Self::Ordinary { .. } => None,
        }
    }
}

/// An op in the graph.
#[derive(Debug, Clone)]
pub struct OpNode {
    /// Op name.
    pub name: NameId,
    /// Control-flow tag.
    pub op_type: OpType,
    /// Input variables, in order.
    pub inputs: Vec<NameId>,
    /// Output variables, in order.
    pub outputs: Vec<NameId>,
    /// Variables that must be available before this op may run, without
    /// being read by it.
    pub control_deps: Vec<NameId>,
}

impl OpNode {
    /// Index of `variable` among the outputs.
    pub fn output_index(&self, variable: NameId) -> Option<usize> {
        self.outputs.iter().position(|&o| o == variable)
    }

    /// Whether this op is a Switch.
    pub fn is_switch(&self) -> bool {
        matches!(self.op_type, OpType::Switch)
    }

    /// Whether this op is a loop-invariant Enter.
    pub fn is_constant_enter(&self) -> bool {
        matches!(self.op_type, OpType::Enter { constant: true, .. })
    }

    /// Whether the op has neither data inputs nor control dependencies.
    pub fn is_source(&self) -> bool {
        self.inputs.is_empty() && self.control_deps.is_empty()
    }
}
