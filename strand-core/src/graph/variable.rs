//! Variable definitions.

use crate::types::NameId;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// How a variable gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Trainable state with a stored value.
    Variable,
    /// Fixed value stored in the graph.
    Constant,
    /// Value supplied by the caller for each run.
    Placeholder,
    /// Output of an op.
    Computed,
}

/// A variable in the graph.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Variable name.
    pub name: NameId,
    /// How the value is obtained.
    pub kind: VariableKind,
    /// Producing op, for computed variables.
    pub producer: Option<NameId>,
    /// Ops that must run before this variable is available.
    pub control_deps: Vec<NameId>,
    /// Stored value of constants and variables.
    pub value: Option<Value>,
    pub(crate) consumers: Vec<NameId>,
    pub(crate) control_consumers: Vec<NameId>,
}

impl Variable {
    pub(crate) fn new(name: NameId, kind: VariableKind) -> Self {
        Self {
            name,
            kind,
            producer: None,
            control_deps: Vec::new(),
            value: None,
            consumers: Vec::new(),
            control_consumers: Vec::new(),
        }
    }

    /// Ops that read this variable, in graph order, each listed once.
    pub fn consumers(&self) -> &[NameId] {
        &self.consumers
    }

    /// Ops that list this variable as a control dependency.
    pub fn control_consumers(&self) -> &[NameId] {
        &self.control_consumers
    }

    /// Whether the value comes from the graph or the caller rather than an op.
    pub fn is_leaf(&self) -> bool {
        self.kind != VariableKind::Computed
    }
}
