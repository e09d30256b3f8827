//! Element-wise kernels.

use super::{broadcast_shape, element, expect_inputs, fill_with, invalid, tensor};
use crate::registry::Kernel;
use strand_core::error::Result;
use strand_core::traits::OpContext;
use strand_core::value::{DataType, Value};

/// Forwards its input unchanged. The output is the same array.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Kernel for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        expect_inputs(ctx, inputs, 1)?;
        Ok(inputs.to_vec())
    }
}

/// One-input kernels that produce a fresh array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Copy of the input.
    Copy,
    /// Negation.
    Neg,
}

impl Kernel for UnaryOp {
    fn name(&self) -> &str {
        match self {
            Self::Copy => "copy",
            Self::Neg => "neg",
        }
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        expect_inputs(ctx, inputs, 1)?;
        let x = tensor(ctx, inputs, 0)?;
        let out = match self {
            Self::Copy => fill_with(ctx, x.dtype(), x.shape().to_vec(), |i| x.data()[i])?,
            Self::Neg => {
                if x.dtype() == DataType::Bool {
                    return Err(invalid(ctx, "cannot negate a bool tensor"));
                }
                fill_with(ctx, x.dtype(), x.shape().to_vec(), |i| -x.data()[i])?
            }
        };
        Ok(vec![out.into()])
    }
}

/// Arithmetic with scalar broadcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`, truncated for integers.
    Div,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
        }
    }
}

impl Kernel for BinaryOp {
    fn name(&self) -> &str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        expect_inputs(ctx, inputs, 2)?;
        let a = tensor(ctx, inputs, 0)?;
        let b = tensor(ctx, inputs, 1)?;
        if a.dtype() == DataType::Bool || b.dtype() == DataType::Bool {
            return Err(invalid(ctx, format!("{} is not defined for bool", self.name())));
        }

        let dtype = if a.dtype() == b.dtype() {
            a.dtype()
        } else {
            DataType::Float64
        };
        let integer = dtype == DataType::Int64;
        if integer && *self == Self::Div && b.data().contains(&0.0) {
            return Err(invalid(ctx, "integer division by zero"));
        }

        let shape = broadcast_shape(ctx, a, b)?;
        let op = *self;
        let out = fill_with(ctx, dtype, shape, |i| {
            let v = op.apply(element(a, i), element(b, i));
            if integer { v.trunc() } else { v }
        })?;
        Ok(vec![out.into()])
    }
}
