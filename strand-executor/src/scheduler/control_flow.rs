//! Native dispatch of control-flow ops and their dependency edges.

use strand_core::dependency::Edge;
use strand_core::error::{Result, StrandError};
use strand_core::types::ExecStep;
use strand_core::value::Value;

/// Why a step waits on another step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEdge {
    /// Leaves hang off the synthetic root step.
    Root,
    /// A data input.
    Input(ExecStep),
    /// Either of two data inputs, for Merge.
    Either(ExecStep, ExecStep),
    /// A control dependency.
    Control(ExecStep),
}

impl From<StepEdge> for Edge<ExecStep> {
    fn from(edge: StepEdge) -> Self {
        match edge {
            StepEdge::Root => Edge::And(ExecStep::root()),
            StepEdge::Input(step) | StepEdge::Control(step) => Edge::And(step),
            StepEdge::Either(a, b) => Edge::Or(a, b),
        }
    }
}

/// Which output of a Switch carries the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Output 0, taken when the predicate is false.
    Left,
    /// Output 1, taken when the predicate is true.
    Right,
}

impl Branch {
    /// Output index of the branch.
    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// Forward whichever Merge input is available, preferring the second.
pub fn merge(op: &str, frame: &str, first: Option<&Value>, second: Option<&Value>) -> Result<Value> {
    second
        .or(first)
        .cloned()
        .ok_or_else(|| StrandError::MergeNoInputs {
            op: op.to_string(),
            frame: frame.to_string(),
        })
}

/// Branch selected by a Switch predicate.
pub fn switch_branch(op: &str, predicate: &Value) -> Result<Branch> {
    Ok(if boolean_scalar(op, predicate)? {
        Branch::Right
    } else {
        Branch::Left
    })
}

/// Pass a loop condition through after checking it is a boolean scalar.
pub fn loop_cond(op: &str, condition: &Value) -> Result<Value> {
    boolean_scalar(op, condition)?;
    Ok(condition.clone())
}

/// Forward the input of an Enter, Exit or NextIteration.
pub fn forward(op: &str, variable: &str, frame: &str, input: Option<&Value>) -> Result<Value> {
    input.cloned().ok_or_else(|| StrandError::MissingFrameValue {
        op: op.to_string(),
        variable: variable.to_string(),
        frame: frame.to_string(),
    })
}

fn boolean_scalar(op: &str, value: &Value) -> Result<bool> {
    let Some(tensor) = value.as_tensor() else {
        return Err(StrandError::InvalidPredicate {
            op: op.to_string(),
            cause: format!("got a list of {} arrays", value.arrays().len()),
        });
    };
    tensor
        .as_bool_scalar()
        .ok_or_else(|| StrandError::InvalidPredicate {
            op: op.to_string(),
            cause: format!("got {:?} with shape {:?}", tensor.dtype(), tensor.shape()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::types::{FrameIterId, NameId};
    use strand_core::value::Tensor;

    #[test]
    fn merge_prefers_second_input() {
        let a = Value::scalar(1.0);
        let b = Value::scalar(2.0);
        assert_eq!(merge("m", "main/0", Some(&a), Some(&b)).unwrap().as_scalar(), Some(2.0));
        assert_eq!(merge("m", "main/0", Some(&a), None).unwrap().as_scalar(), Some(1.0));
        assert_eq!(merge("m", "main/0", None, Some(&b)).unwrap().as_scalar(), Some(2.0));
    }

    #[test]
    fn merge_without_inputs_fails() {
        let err = merge("m", "body/1 < main/0", None, None).unwrap_err();
        assert_eq!(err.code(), "E303");
        assert!(err.to_string().contains("body/1"));
    }

    #[test]
    fn switch_routes_by_predicate() {
        assert_eq!(switch_branch("s", &Value::bool(true)).unwrap(), Branch::Right);
        assert_eq!(switch_branch("s", &Value::bool(false)).unwrap(), Branch::Left);
        assert_eq!(Branch::Left.index(), 0);
        assert_eq!(Branch::Right.index(), 1);
    }

    #[test]
    fn predicate_must_be_boolean_scalar() {
        assert_eq!(switch_branch("s", &Value::scalar(1.0)).unwrap_err().code(), "E304");

        let vector = Value::Tensor(Tensor::vector(vec![1.0, 0.0]));
        assert_eq!(loop_cond("c", &vector).unwrap_err().code(), "E304");

        let list = Value::List(vec![Tensor::scalar_bool(true)]);
        assert_eq!(switch_branch("s", &list).unwrap_err().code(), "E304");
    }

    #[test]
    fn forward_keeps_array_identity() {
        let value = Value::scalar(4.0);
        let forwarded = forward("enter", "x", "main/0", Some(&value)).unwrap();
        assert_eq!(forwarded.arrays()[0].id(), value.arrays()[0].id());

        let err = forward("exit", "x", "body/2 < main/0", None).unwrap_err();
        assert_eq!(err.code(), "E305");
    }

    #[test]
    fn edges_map_to_tracker_edges() {
        let a = ExecStep::op(NameId::new(3), FrameIterId::OUTER);
        let b = ExecStep::op(NameId::new(4), FrameIterId::OUTER);
        assert_eq!(Edge::from(StepEdge::Root), Edge::And(ExecStep::root()));
        assert_eq!(Edge::from(StepEdge::Control(a)), Edge::And(a));
        assert_eq!(Edge::from(StepEdge::Either(a, b)), Edge::Or(a, b));
    }
}
