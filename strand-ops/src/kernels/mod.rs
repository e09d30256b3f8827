//! Reference kernel implementations.
//!
//! Inputs are checked for count and kind before any allocation. Binary
//! kernels broadcast a one-element operand against the other; any other
//! shape mismatch is a `KernelInput` error.

mod compare;
mod elementwise;
mod shape;

pub use compare::{CompareOp, LogicalNot};
pub use elementwise::{BinaryOp, Identity, UnaryOp};
pub use shape::{Fill, Pack, Sum};

use crate::registry::Kernel;
use std::sync::Arc;
use strand_core::error::{Result, ResultExt, StrandError};
use strand_core::traits::OpContext;
use strand_core::value::{ArrayDescriptor, DataType, Tensor, Value};

/// Every reference kernel.
pub fn defaults() -> Vec<Arc<dyn Kernel>> {
    vec![
        Arc::new(Identity),
        Arc::new(UnaryOp::Copy),
        Arc::new(UnaryOp::Neg),
        Arc::new(BinaryOp::Add),
        Arc::new(BinaryOp::Sub),
        Arc::new(BinaryOp::Mul),
        Arc::new(BinaryOp::Div),
        Arc::new(CompareOp::Less),
        Arc::new(CompareOp::LessEqual),
        Arc::new(CompareOp::Greater),
        Arc::new(CompareOp::Equal),
        Arc::new(LogicalNot),
        Arc::new(Sum),
        Arc::new(Fill::Zeros),
        Arc::new(Fill::Ones),
        Arc::new(Pack),
    ]
}

fn invalid(ctx: &OpContext<'_>, cause: impl Into<String>) -> StrandError {
    StrandError::KernelInput {
        op: ctx.op.to_string(),
        cause: cause.into(),
    }
}

fn expect_inputs(ctx: &OpContext<'_>, inputs: &[Value], expected: usize) -> Result<()> {
    if inputs.len() != expected {
        return Err(invalid(
            ctx,
            format!("{} expects {expected} inputs, got {}", ctx.kernel, inputs.len()),
        ));
    }
    Ok(())
}

fn tensor<'v>(ctx: &OpContext<'_>, inputs: &'v [Value], index: usize) -> Result<&'v Tensor> {
    inputs
        .get(index)
        .and_then(Value::as_tensor)
        .ok_or_else(|| invalid(ctx, format!("input {index} of {} must be a tensor", ctx.kernel)))
}

/// Output shape of a broadcasting binary kernel.
fn broadcast_shape(ctx: &OpContext<'_>, a: &Tensor, b: &Tensor) -> Result<Vec<usize>> {
    if a.shape() == b.shape() || b.is_scalar() {
        Ok(a.shape().to_vec())
    } else if a.is_scalar() {
        Ok(b.shape().to_vec())
    } else {
        Err(invalid(
            ctx,
            format!("shapes {:?} and {:?} do not broadcast", a.shape(), b.shape()),
        ))
    }
}

fn element(t: &Tensor, index: usize) -> f64 {
    if t.is_scalar() { t.data()[0] } else { t.data()[index] }
}

/// Allocate an array through the memory manager and write every element.
fn fill_with(
    ctx: &OpContext<'_>,
    dtype: DataType,
    shape: Vec<usize>,
    f: impl Fn(usize) -> f64,
) -> Result<Tensor> {
    let mut out = ctx
        .allocate(&ArrayDescriptor::new(dtype, shape))
        .with_op(ctx.op)?;
    for (i, x) in out.data_mut().iter_mut().enumerate() {
        *x = f(i);
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use strand_core::testing::MockMemoryManager;

    pub(crate) fn compute(
        kernel: &dyn Kernel,
        memory: &MockMemoryManager,
        inputs: &[Value],
    ) -> Result<Vec<Value>> {
        let ctx = OpContext {
            op: "under_test",
            kernel: kernel.name(),
            frame: "main",
            iteration: 0,
            memory,
        };
        kernel.compute(&ctx, inputs)
    }

    pub(crate) fn vector(values: &[f64]) -> Value {
        Value::Tensor(Tensor::vector(values.to_vec()))
    }

    pub(crate) fn data(value: &Value) -> Vec<f64> {
        value.as_tensor().map(|t| t.data().to_vec()).unwrap_or_default()
    }
}
