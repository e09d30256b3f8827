//! The computation graph consumed by the scheduler.
//!
//! A [`Graph`] is immutable once built. Every variable, op and frame name is
//! interned into the graph's [`NameTable`], so scheduling keys can refer to
//! names by handle for the lifetime of the graph.
//!
//! # Example
//!
//! ```
//! use strand_core::graph::Graph;
//!
//! let graph = Graph::builder()
//!     .placeholder("a")
//!     .op("id", "identity", &["a"], &["out"])
//!     .build()
//!     .unwrap();
//! assert!(graph.variable_named("out").is_some());
//! ```

mod builder;
mod op;
mod variable;

pub use builder::GraphBuilder;
pub use op::{OpNode, OpType};
pub use variable::{Variable, VariableKind};

use crate::error::{Result, StrandError};
use crate::types::{NameId, NameTable};
use std::collections::HashMap;

/// Strip a trailing `:N` output-index suffix from a variable name.
///
/// Names without a purely numeric suffix are returned unchanged.
pub fn strip_output_suffix(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((base, index))
            if !base.is_empty() && !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

/// An immutable computation graph.
#[derive(Debug, Clone)]
pub struct Graph {
    names: NameTable,
    variables: Vec<Variable>,
    variable_index: HashMap<NameId, usize>,
    ops: Vec<OpNode>,
    op_index: HashMap<NameId, usize>,
}

impl Graph {
    /// Start building a graph.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// The name table of this graph.
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Text of an interned name.
    pub fn name(&self, id: NameId) -> &str {
        self.names.resolve(id)
    }

    /// Handle of a name, if it appears in the graph.
    pub fn lookup(&self, name: &str) -> Option<NameId> {
        self.names.get(name)
    }

    /// Variable by handle.
    pub fn variable(&self, id: NameId) -> Option<&Variable> {
        self.variable_index.get(&id).map(|&i| &self.variables[i])
    }

    /// Variable by name.
    pub fn variable_named(&self, name: &str) -> Option<&Variable> {
        self.lookup(name).and_then(|id| self.variable(id))
    }

    /// Op by handle.
    pub fn op(&self, id: NameId) -> Option<&OpNode> {
        self.op_index.get(&id).map(|&i| &self.ops[i])
    }

    /// Op by name.
    pub fn op_named(&self, name: &str) -> Option<&OpNode> {
        self.lookup(name).and_then(|id| self.op(id))
    }

    /// Variable by handle, or an `UnknownVariable` error.
    pub fn require_variable(&self, id: NameId) -> Result<&Variable> {
        self.variable(id).ok_or_else(|| StrandError::UnknownVariable {
            name: self.name(id).to_string(),
        })
    }

    /// Op by handle, or an `UnknownOp` error.
    pub fn require_op(&self, id: NameId) -> Result<&OpNode> {
        self.op(id).ok_or_else(|| StrandError::UnknownOp {
            name: self.name(id).to_string(),
        })
    }

    /// The variable that actually holds the value of `id`.
    ///
    /// A computed variable without a producer whose name carries an output
    /// suffix (`x:1`) is an alias of the unsuffixed variable.
    pub fn canonical_variable(&self, id: NameId) -> Result<&Variable> {
        let var = self.require_variable(id)?;
        if var.kind != VariableKind::Computed || var.producer.is_some() {
            return Ok(var);
        }
        let name = self.name(id);
        let stripped = strip_output_suffix(name);
        if stripped != name {
            if let Some(base) = self.variable_named(stripped) {
                return Ok(base);
            }
        }
        Err(StrandError::NoProducer {
            variable: name.to_string(),
        })
    }

    /// All variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// All ops in declaration order.
    pub fn ops(&self) -> impl Iterator<Item = &OpNode> {
        self.ops.iter()
    }

    /// All placeholders in declaration order.
    pub fn placeholders(&self) -> impl Iterator<Item = &Variable> {
        self.variables
            .iter()
            .filter(|v| v.kind == VariableKind::Placeholder)
    }

    /// Number of variables.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of ops.
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn strip_suffix() {
        assert_eq!(strip_output_suffix("switch:1"), "switch");
        assert_eq!(strip_output_suffix("a:b"), "a:b");
        assert_eq!(strip_output_suffix("plain"), "plain");
        assert_eq!(strip_output_suffix(":3"), ":3");
        assert_eq!(strip_output_suffix("x:"), "x:");
    }

    #[test]
    fn consumers_are_derived() {
        let graph = Graph::builder()
            .placeholder("a")
            .constant("c", Value::scalar(2.0))
            .op("add", "add", &["a", "c"], &["sum"])
            .op("square", "mul", &["sum", "sum"], &["sq"])
            .build()
            .unwrap();

        let sum = graph.variable_named("sum").unwrap();
        assert_eq!(sum.consumers(), &[graph.lookup("square").unwrap()]);
        assert_eq!(sum.producer, graph.lookup("add"));

        let a = graph.variable_named("a").unwrap();
        assert_eq!(a.consumers(), &[graph.lookup("add").unwrap()]);
        assert_eq!(graph.placeholders().count(), 1);
        assert_eq!(graph.op_count(), 2);
    }

    #[test]
    fn suffix_alias_resolves_to_base() {
        let graph = Graph::builder()
            .placeholder("a")
            .op("split", "identity", &["a"], &["split"])
            .op("use", "identity", &["split:0"], &["out"])
            .build()
            .unwrap();

        let alias = graph.lookup("split:0").unwrap();
        let canonical = graph.canonical_variable(alias).unwrap();
        assert_eq!(graph.name(canonical.name), "split");
    }
}
