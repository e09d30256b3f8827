//! Scheduling units and value keys.

use super::ids::{FrameIterId, NameId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a scheduling unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecKind {
    /// An op instance.
    Op,
    /// A trainable variable with a stored value.
    Variable,
    /// A constant with a stored value.
    Constant,
    /// A placeholder fed by the caller.
    Placeholder,
    /// The first (predicate false) output of a Switch.
    SwitchLeft,
    /// The second (predicate true) output of a Switch.
    SwitchRight,
    /// The synthetic step every leaf hangs off.
    Root,
}

impl ExecKind {
    /// Whether this kind names a Switch branch.
    #[must_use]
    pub fn is_switch_branch(self) -> bool {
        matches!(self, Self::SwitchLeft | Self::SwitchRight)
    }
}

impl fmt::Display for ExecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Op => "op",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Placeholder => "placeholder",
            Self::SwitchLeft => "switch_left",
            Self::SwitchRight => "switch_right",
            Self::Root => "root",
        };
        f.write_str(s)
    }
}

/// A (kind, name, frame) scheduling unit.
///
/// Equality and hashing are by all three fields. Names and frames are
/// interned handles, so the key is a few machine words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecStep {
    /// Step kind.
    pub kind: ExecKind,
    /// Op or variable name.
    pub name: NameId,
    /// Frame and iteration.
    pub frame: FrameIterId,
}

impl ExecStep {
    /// Create a step.
    #[must_use]
    pub const fn new(kind: ExecKind, name: NameId, frame: FrameIterId) -> Self {
        Self { kind, name, frame }
    }

    /// An op step.
    #[must_use]
    pub const fn op(name: NameId, frame: FrameIterId) -> Self {
        Self::new(ExecKind::Op, name, frame)
    }

    /// The synthetic root step.
    #[must_use]
    pub const fn root() -> Self {
        Self::new(ExecKind::Root, NameId::EMPTY, FrameIterId::OUTER)
    }

    /// Same kind and name in another frame.
    #[must_use]
    pub const fn in_frame(self, frame: FrameIterId) -> Self {
        Self { frame, ..self }
    }
}

impl fmt::Display for ExecStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.kind, self.name, self.frame)
    }
}

/// One concrete value of a variable: (name, frame, iteration, parent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId {
    /// Variable name.
    pub name: NameId,
    /// Frame, iteration and parent.
    pub frame: FrameIterId,
}

impl VarId {
    /// Create a value key.
    #[must_use]
    pub const fn new(name: NameId, frame: FrameIterId) -> Self {
        Self { name, frame }
    }

    /// Key in the outer frame.
    #[must_use]
    pub const fn outer(name: NameId) -> Self {
        Self::new(name, FrameIterId::OUTER)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.frame)
    }
}
