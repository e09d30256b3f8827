//! Reductions, fills and list packing.

use super::{expect_inputs, fill_with, invalid, tensor};
use crate::registry::Kernel;
use strand_core::error::Result;
use strand_core::traits::OpContext;
use strand_core::value::{DataType, Tensor, Value};

/// Sum of every element of a tensor or of every tensor in a list, as a
/// scalar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Kernel for Sum {
    fn name(&self) -> &str {
        "sum"
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        expect_inputs(ctx, inputs, 1)?;
        let arrays = inputs[0].arrays();
        let dtype = match arrays.first().map(Tensor::dtype) {
            Some(DataType::Bool) => DataType::Int64,
            Some(dtype) if arrays.iter().all(|t| t.dtype() == dtype) => dtype,
            _ => DataType::Float64,
        };
        let total: f64 = arrays.iter().flat_map(|t| t.data().iter()).sum();
        let out = fill_with(ctx, dtype, Vec::new(), |_| total)?;
        Ok(vec![out.into()])
    }
}

/// Arrays shaped like the input, filled with a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// `zeros_like`
    Zeros,
    /// `ones_like`
    Ones,
}

impl Kernel for Fill {
    fn name(&self) -> &str {
        match self {
            Self::Zeros => "zeros_like",
            Self::Ones => "ones_like",
        }
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        expect_inputs(ctx, inputs, 1)?;
        let x = tensor(ctx, inputs, 0)?;
        let value = match self {
            Self::Zeros => 0.0,
            Self::Ones => 1.0,
        };
        let out = fill_with(ctx, x.dtype(), x.shape().to_vec(), |_| value)?;
        Ok(vec![out.into()])
    }
}

/// A list holding the arrays of every input, in order. No array is copied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pack;

impl Kernel for Pack {
    fn name(&self) -> &str {
        "pack"
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        if inputs.is_empty() {
            return Err(invalid(ctx, "pack needs at least one input"));
        }
        let items = inputs.iter().flat_map(|v| v.arrays().iter().cloned()).collect();
        Ok(vec![Value::List(items)])
    }
}
