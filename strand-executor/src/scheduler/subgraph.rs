//! The part of the graph a request can reach.

use std::collections::{HashMap, HashSet};
use strand_core::error::Result;
use strand_core::graph::{Graph, OpNode, Variable};
use strand_core::types::NameId;

/// Minimal set of variables and ops that can influence a request.
///
/// Built by walking backwards from the requested and extra required
/// variables through producing ops, op inputs, op control dependencies and
/// variable control dependencies. Suffix aliases (`x:1`) pull in the
/// variable they stand for.
#[derive(Debug, Default)]
pub struct Subgraph {
    variables: HashSet<NameId>,
    ops: HashSet<NameId>,
    aliases: HashMap<NameId, Vec<NameId>>,
}

impl Subgraph {
    /// Walk backwards from `roots`.
    pub fn build(graph: &Graph, roots: &[NameId]) -> Result<Self> {
        let mut subgraph = Self::default();
        let mut pending_vars: Vec<NameId> = roots.to_vec();
        let mut pending_ops: Vec<NameId> = Vec::new();

        loop {
            if let Some(name) = pending_vars.pop() {
                if !subgraph.variables.insert(name) {
                    continue;
                }
                let var = graph.require_variable(name)?;
                let canonical = graph.canonical_variable(name)?.name;
                if canonical != name {
                    subgraph.aliases.entry(canonical).or_default().push(name);
                    pending_vars.push(canonical);
                    continue;
                }
                pending_ops.extend(var.producer);
                pending_ops.extend(var.control_deps.iter().copied());
            } else if let Some(name) = pending_ops.pop() {
                if !subgraph.ops.insert(name) {
                    continue;
                }
                let op = graph.require_op(name)?;
                pending_vars.extend(op.inputs.iter().copied());
                pending_vars.extend(op.control_deps.iter().copied());
            } else {
                break;
            }
        }

        Ok(subgraph)
    }

    /// Whether `op` is part of the subgraph.
    pub fn contains_op(&self, op: NameId) -> bool {
        self.ops.contains(&op)
    }

    /// Whether `variable` is part of the subgraph.
    pub fn contains_variable(&self, variable: NameId) -> bool {
        self.variables.contains(&variable)
    }

    /// Suffix aliases of `variable` that the subgraph refers to.
    pub fn aliases_of(&self, variable: NameId) -> &[NameId] {
        self.aliases.get(&variable).map_or(&[], Vec::as_slice)
    }

    /// Subgraph ops that read `variable` or one of its aliases, each once.
    pub fn readers(&self, graph: &Graph, variable: NameId) -> Vec<NameId> {
        self.collect_consumers(graph, variable, |v| v.consumers())
    }

    /// Subgraph ops with a control dependency on `variable` or one of its
    /// aliases, each once.
    pub fn control_readers(&self, graph: &Graph, variable: NameId) -> Vec<NameId> {
        self.collect_consumers(graph, variable, |v| v.control_consumers())
    }

    fn collect_consumers<F>(&self, graph: &Graph, variable: NameId, list: F) -> Vec<NameId>
    where
        F: Fn(&Variable) -> &[NameId],
    {
        let mut ops = Vec::new();
        let names = std::iter::once(variable).chain(self.aliases_of(variable).iter().copied());
        for name in names {
            let Some(var) = graph.variable(name) else {
                continue;
            };
            for &op in list(var) {
                if self.ops.contains(&op) && !ops.contains(&op) {
                    ops.push(op);
                }
            }
        }
        ops
    }

    /// Placeholders, constants and variables of the subgraph, in graph order.
    pub fn leaves<'g>(&self, graph: &'g Graph) -> Vec<&'g Variable> {
        graph
            .variables()
            .filter(|v| v.is_leaf() && self.variables.contains(&v.name))
            .collect()
    }

    /// Ops with neither inputs nor control dependencies, in graph order.
    pub fn sources<'g>(&self, graph: &'g Graph) -> Vec<&'g OpNode> {
        graph
            .ops()
            .filter(|op| op.is_source() && self.ops.contains(&op.name))
            .collect()
    }

    /// Number of ops.
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Number of variables, aliases included.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.variables.clear();
        self.ops.clear();
        self.aliases.clear();
    }
}
