//! Comparison and boolean kernels.

use super::{broadcast_shape, element, expect_inputs, fill_with, invalid, tensor};
use crate::registry::Kernel;
use strand_core::error::Result;
use strand_core::traits::OpContext;
use strand_core::value::{DataType, Value};

/// Element-wise comparisons producing bool tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `a < b`
    Less,
    /// `a <= b`
    LessEqual,
    /// `a > b`
    Greater,
    /// `a == b`
    Equal,
}

impl CompareOp {
    fn test(self, a: f64, b: f64) -> bool {
        match self {
            Self::Less => a < b,
            Self::LessEqual => a <= b,
            Self::Greater => a > b,
            Self::Equal => a == b,
        }
    }
}

impl Kernel for CompareOp {
    fn name(&self) -> &str {
        match self {
            Self::Less => "less",
            Self::LessEqual => "less_equal",
            Self::Greater => "greater",
            Self::Equal => "equal",
        }
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        expect_inputs(ctx, inputs, 2)?;
        let a = tensor(ctx, inputs, 0)?;
        let b = tensor(ctx, inputs, 1)?;
        let shape = broadcast_shape(ctx, a, b)?;
        let op = *self;
        let out = fill_with(ctx, DataType::Bool, shape, |i| {
            if op.test(element(a, i), element(b, i)) { 1.0 } else { 0.0 }
        })?;
        Ok(vec![out.into()])
    }
}

/// Boolean negation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalNot;

impl Kernel for LogicalNot {
    fn name(&self) -> &str {
        "logical_not"
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        expect_inputs(ctx, inputs, 1)?;
        let x = tensor(ctx, inputs, 0)?;
        if x.dtype() != DataType::Bool {
            return Err(invalid(ctx, format!("logical_not needs bool, got {}", x.dtype())));
        }
        let out = fill_with(ctx, DataType::Bool, x.shape().to_vec(), |i| {
            if x.data()[i] == 0.0 { 1.0 } else { 0.0 }
        })?;
        Ok(vec![out.into()])
    }
}
