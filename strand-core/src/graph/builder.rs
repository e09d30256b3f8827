//! Fluent construction and validation of graphs.

use super::{Graph, OpNode, OpType, Variable, VariableKind, strip_output_suffix};
use crate::error::{Result, StrandError};
use crate::types::{NameId, NameTable};
use crate::value::Value;
use std::collections::HashMap;

/// Builder for [`Graph`].
///
/// Ops may reference variables that are declared later, which is how loop
/// back-edges are written. References are checked in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct GraphBuilder {
    names: NameTable,
    variables: Vec<Variable>,
    variable_index: HashMap<NameId, usize>,
    ops: Vec<OpNode>,
    op_index: HashMap<NameId, usize>,
    errors: Vec<String>,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a placeholder.
    pub fn placeholder(mut self, name: &str) -> Self {
        self.declare(name, VariableKind::Placeholder, None);
        self
    }

    /// Declare a constant.
    pub fn constant(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.declare(name, VariableKind::Constant, Some(value.into()));
        self
    }

    /// Declare a trainable variable.
    pub fn variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.declare(name, VariableKind::Variable, Some(value.into()));
        self
    }

    /// Declare an ordinary op executed by `kernel`.
    pub fn op(self, name: &str, kernel: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        self.add_op(name, OpType::ordinary(kernel), inputs, outputs)
    }

    /// Declare a Merge of two inputs.
    pub fn merge(self, name: &str, inputs: [&str; 2], output: &str) -> Self {
        self.add_op(name, OpType::Merge, &inputs, &[output])
    }

    /// Declare a Switch. `outputs` is (predicate false, predicate true).
    pub fn switch(self, name: &str, data: &str, predicate: &str, outputs: [&str; 2]) -> Self {
        self.add_op(name, OpType::Switch, &[data, predicate], &outputs)
    }

    /// Declare an Enter into `frame`.
    pub fn enter(mut self, name: &str, input: &str, frame: &str, output: &str) -> Self {
        let frame = self.names.intern(frame);
        self.add_op(
            name,
            OpType::Enter {
                frame,
                constant: false,
            },
            &[input],
            &[output],
        )
    }

    /// Declare an Enter of a loop-invariant value into `frame`.
    pub fn enter_constant(mut self, name: &str, input: &str, frame: &str, output: &str) -> Self {
        let frame = self.names.intern(frame);
        self.add_op(
            name,
            OpType::Enter {
                frame,
                constant: true,
            },
            &[input],
            &[output],
        )
    }

    /// Declare an Exit to the enclosing frame.
    pub fn exit(self, name: &str, input: &str, output: &str) -> Self {
        self.add_op(name, OpType::Exit, &[input], &[output])
    }

    /// Declare a NextIteration.
    pub fn next_iteration(self, name: &str, input: &str, output: &str) -> Self {
        self.add_op(name, OpType::NextIteration, &[input], &[output])
    }

    /// Declare a LoopCond.
    pub fn loop_cond(self, name: &str, input: &str, output: &str) -> Self {
        self.add_op(name, OpType::LoopCond, &[input], &[output])
    }

    /// Make op `op` wait for variable `variable` without reading it.
    pub fn control_dep(mut self, op: &str, variable: &str) -> Self {
        let op_id = self.names.intern(op);
        let var_id = self.names.intern(variable);
        match self.op_index.get(&op_id) {
            Some(&i) => {
                if !self.ops[i].control_deps.contains(&var_id) {
                    self.ops[i].control_deps.push(var_id);
                }
            }
            None => self
                .errors
                .push(format!("control dependency on undeclared op {op}")),
        }
        self
    }

    /// Make variable `variable` unavailable until op `op` has run.
    pub fn variable_control_dep(mut self, variable: &str, op: &str) -> Self {
        let var_id = self.names.intern(variable);
        let op_id = self.names.intern(op);
        match self.variable_index.get(&var_id) {
            Some(&i) => {
                if !self.variables[i].control_deps.contains(&op_id) {
                    self.variables[i].control_deps.push(op_id);
                }
            }
            None => self
                .errors
                .push(format!("control dependency on undeclared variable {variable}")),
        }
        self
    }

    /// Validate references and derive consumer lists.
    pub fn build(mut self) -> Result<Graph> {
        if let Some(cause) = self.errors.first() {
            return Err(StrandError::InvalidTopology {
                cause: cause.clone(),
            });
        }

        self.declare_suffix_aliases()?;
        self.check_references()?;
        self.check_arity()?;

        for var in &self.variables {
            if var.kind == VariableKind::Computed && var.producer.is_none() {
                let name = self.names.resolve(var.name);
                let stripped = strip_output_suffix(name);
                let aliased = stripped != name
                    && self
                        .names
                        .get(stripped)
                        .is_some_and(|id| self.variable_index.contains_key(&id));
                if !aliased {
                    return Err(StrandError::NoProducer {
                        variable: name.to_string(),
                    });
                }
            }
        }

        for op in &self.ops {
            for &input in &op.inputs {
                let var = &mut self.variables[self.variable_index[&input]];
                if !var.consumers.contains(&op.name) {
                    var.consumers.push(op.name);
                }
            }
            for &dep in &op.control_deps {
                let var = &mut self.variables[self.variable_index[&dep]];
                if !var.control_consumers.contains(&op.name) {
                    var.control_consumers.push(op.name);
                }
            }
        }

        Ok(Graph {
            names: self.names,
            variables: self.variables,
            variable_index: self.variable_index,
            ops: self.ops,
            op_index: self.op_index,
        })
    }

    fn declare(&mut self, name: &str, kind: VariableKind, value: Option<Value>) -> NameId {
        let id = self.names.intern(name);
        if self.variable_index.contains_key(&id) {
            self.errors.push(format!("variable {name} declared twice"));
            return id;
        }
        let mut var = Variable::new(id, kind);
        var.value = value;
        self.variable_index.insert(id, self.variables.len());
        self.variables.push(var);
        id
    }

    fn add_op(mut self, name: &str, op_type: OpType, inputs: &[&str], outputs: &[&str]) -> Self {
        let id = self.names.intern(name);
        if self.op_index.contains_key(&id) {
            self.errors.push(format!("op {name} declared twice"));
            return self;
        }

        let inputs = inputs.iter().map(|i| self.names.intern(i)).collect();
        let mut output_ids = Vec::with_capacity(outputs.len());
        for &output in outputs {
            let out = self.names.intern(output);
            match self.variable_index.get(&out) {
                Some(&i) => {
                    let var = &mut self.variables[i];
                    if var.kind != VariableKind::Computed || var.producer.is_some() {
                        self.errors
                            .push(format!("variable {output} already has a producer"));
                    } else {
                        var.producer = Some(id);
                    }
                }
                None => {
                    let out = self.declare(output, VariableKind::Computed, None);
                    let i = self.variable_index[&out];
                    self.variables[i].producer = Some(id);
                }
            }
            output_ids.push(out);
        }

        self.op_index.insert(id, self.ops.len());
        self.ops.push(OpNode {
            name: id,
            op_type,
            inputs,
            outputs: output_ids,
            control_deps: Vec::new(),
        });
        self
    }

    fn declare_suffix_aliases(&mut self) -> Result<()> {
        let mut missing = Vec::new();
        for op in &self.ops {
            for &input in &op.inputs {
                if !self.variable_index.contains_key(&input) && !missing.contains(&input) {
                    missing.push(input);
                }
            }
        }
        for id in missing {
            let name = self.names.resolve(id).to_string();
            let stripped = strip_output_suffix(&name);
            let base_known = stripped != name
                && self
                    .names
                    .get(stripped)
                    .is_some_and(|b| self.variable_index.contains_key(&b));
            if !base_known {
                return Err(StrandError::UnknownVariable { name });
            }
            self.declare(&name, VariableKind::Computed, None);
        }
        Ok(())
    }

    fn check_references(&self) -> Result<()> {
        for op in &self.ops {
            if let Some(&dep) = op
                .control_deps
                .iter()
                .find(|d| !self.variable_index.contains_key(d))
            {
                return Err(StrandError::UnknownVariable {
                    name: self.names.resolve(dep).to_string(),
                });
            }
        }
        for var in &self.variables {
            if let Some(&op) = var
                .control_deps
                .iter()
                .find(|o| !self.op_index.contains_key(o))
            {
                return Err(StrandError::UnknownOp {
                    name: self.names.resolve(op).to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_arity(&self) -> Result<()> {
        for op in &self.ops {
            let Some((inputs, outputs)) = op.op_type.fixed_arity() else {
                continue;
            };
            let name = self.names.resolve(op.name);
            if op.inputs.len() != inputs {
                return Err(StrandError::OpArity {
                    op: name.to_string(),
                    what: "inputs",
                    expected: inputs,
                    actual: op.inputs.len(),
                });
            }
            if op.outputs.len() != outputs {
                return Err(StrandError::OpArity {
                    op: name.to_string(),
                    what: "outputs",
                    expected: outputs,
                    actual: op.outputs.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_references_are_allowed() {
        let graph = GraphBuilder::new()
            .placeholder("x")
            .constant("limit", Value::scalar(3.0))
            .enter("enter", "x", "loop", "x_in")
            .merge("merge", ["x_in", "x_next"], "x_cur")
            .op("inc", "add", &["x_cur", "x_cur"], &["x_inc"])
            .next_iteration("next", "x_inc", "x_next")
            .build()
            .unwrap();

        let next = graph.variable_named("x_next").unwrap();
        assert_eq!(next.producer, graph.lookup("next"));
        assert_eq!(next.consumers(), &[graph.lookup("merge").unwrap()]);
    }

    #[test]
    fn unknown_input_is_rejected() {
        let err = GraphBuilder::new()
            .op("id", "identity", &["ghost"], &["out"])
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "E302");
    }

    #[test]
    fn duplicate_producer_is_rejected() {
        let err = GraphBuilder::new()
            .placeholder("a")
            .op("one", "identity", &["a"], &["out"])
            .op("two", "identity", &["a"], &["out"])
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "E310");
        assert!(err.to_string().contains("already has a producer"));
    }

    #[test]
    fn placeholder_cannot_be_an_output() {
        let err = GraphBuilder::new()
            .placeholder("a")
            .placeholder("b")
            .op("id", "identity", &["a"], &["b"])
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "E310");
    }

    #[test]
    fn control_flow_arity_is_checked() {
        let err = GraphBuilder::new()
            .placeholder("a")
            .op("m", "identity", &["a"], &["b"])
            .add_op("bad_merge", OpType::Merge, &["a"], &["c"])
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "E307");
    }

    #[test]
    fn control_dependencies_are_recorded() {
        let graph = GraphBuilder::new()
            .placeholder("a")
            .constant("c", Value::scalar(1.0))
            .op("first", "identity", &["a"], &["x"])
            .op("second", "identity", &["c"], &["y"])
            .control_dep("second", "x")
            .variable_control_dep("c", "first")
            .build()
            .unwrap();

        let second = graph.op_named("second").unwrap();
        assert_eq!(second.control_deps, vec![graph.lookup("x").unwrap()]);
        assert!(!second.is_source());
        let x = graph.variable_named("x").unwrap();
        assert_eq!(x.control_consumers(), &[second.name]);
        let c = graph.variable_named("c").unwrap();
        assert_eq!(c.control_deps, vec![graph.lookup("first").unwrap()]);
    }

    #[test]
    fn control_dep_on_undeclared_op_is_rejected() {
        let err = GraphBuilder::new()
            .placeholder("a")
            .control_dep("nope", "a")
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "E310");
    }

    #[test]
    fn variable_control_dep_on_unknown_op_is_rejected() {
        let err = GraphBuilder::new()
            .placeholder("a")
            .variable_control_dep("a", "ghost")
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "E301");
    }
}
