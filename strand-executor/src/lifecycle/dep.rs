//! Reasons an array must stay allocated.

use std::fmt;
use strand_core::types::{FrameIterId, NameId};

/// One pending obligation on an array.
///
/// An array may be released once every obligation registered for it has
/// been satisfied. Holder obligations are never satisfied during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dep {
    /// An op instance that will read the array. Keyed by the op and the
    /// frame its outputs are produced in.
    OpConsumer {
        /// Consuming op.
        op: NameId,
        /// Output frame of the consuming op instance.
        frame: FrameIterId,
    },
    /// The array is the value of a placeholder fed by the caller.
    PlaceholderHolder(NameId),
    /// The array is the stored value of a constant.
    ConstantHolder(NameId),
    /// The array is the stored value of a trainable variable.
    VariableHolder(NameId),
    /// The array is returned to the caller under this output name.
    RequestedOutput(NameId),
    /// Satisfied once, when the run ends.
    EndOfRun,
}

impl Dep {
    /// Whether this obligation pins the array for the whole run.
    #[must_use]
    pub fn is_holder(&self) -> bool {
        matches!(
            self,
            Self::PlaceholderHolder(_) | Self::ConstantHolder(_) | Self::VariableHolder(_)
        )
    }

    /// Whether this obligation is an op instance that reads the array.
    #[must_use]
    pub fn is_consumer(&self) -> bool {
        matches!(self, Self::OpConsumer { .. })
    }
}

impl fmt::Display for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpConsumer { op, frame } => write!(f, "consumer({op}, {frame})"),
            Self::PlaceholderHolder(name) => write!(f, "placeholder({name})"),
            Self::ConstantHolder(name) => write!(f, "constant({name})"),
            Self::VariableHolder(name) => write!(f, "variable({name})"),
            Self::RequestedOutput(name) => write!(f, "requested({name})"),
            Self::EndOfRun => f.write_str("end_of_run"),
        }
    }
}
