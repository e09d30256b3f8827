//! Kernel lookup by name.

use crate::kernels;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strand_core::error::{Result, StrandError};
use strand_core::traits::{OpContext, OpExecutor};
use strand_core::value::Value;

/// A named numerical kernel.
pub trait Kernel: Send + Sync {
    /// Name ops refer to this kernel by.
    fn name(&self) -> &str;

    /// Compute the outputs of one op instance.
    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>>;
}

/// A kernel backed by a closure.
pub struct FnKernel<F> {
    name: String,
    f: F,
}

impl<F> FnKernel<F>
where
    F: Fn(&OpContext<'_>, &[Value]) -> Result<Vec<Value>> + Send + Sync,
{
    /// Wrap `f` as the kernel `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Kernel for FnKernel<F>
where
    F: Fn(&OpContext<'_>, &[Value]) -> Result<Vec<Value>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        (self.f)(ctx, inputs)
    }
}

/// Kernels by name, usable as the session's op executor.
#[derive(Clone, Default)]
pub struct KernelRegistry {
    kernels: HashMap<String, Arc<dyn Kernel>>,
}

impl KernelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every reference kernel.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kernel in kernels::defaults() {
            registry.register(kernel);
        }
        registry
    }

    /// Register a kernel, returning the one it replaces.
    pub fn register(&mut self, kernel: Arc<dyn Kernel>) -> Option<Arc<dyn Kernel>> {
        self.kernels.insert(kernel.name().to_string(), kernel)
    }

    /// Register a closure as the kernel `name`.
    pub fn register_fn<F>(&mut self, name: &str, f: F) -> Option<Arc<dyn Kernel>>
    where
        F: Fn(&OpContext<'_>, &[Value]) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnKernel::new(name, f)))
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_kernel(mut self, kernel: Arc<dyn Kernel>) -> Self {
        self.register(kernel);
        self
    }

    /// Kernel registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Kernel>> {
        self.kernels.get(name)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kernels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Whether no kernel is registered.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("kernels", &self.names())
            .finish()
    }
}

impl OpExecutor for KernelRegistry {
    fn execute(&self, ctx: &OpContext<'_>, inputs: &[Value]) -> Result<Vec<Value>> {
        let kernel = self
            .kernels
            .get(ctx.kernel)
            .ok_or_else(|| StrandError::UnsupportedOp {
                op: ctx.op.to_string(),
                kernel: ctx.kernel.to_string(),
            })?;
        tracing::trace!(
            op = ctx.op,
            kernel = ctx.kernel,
            frame = ctx.frame,
            iteration = ctx.iteration,
            inputs = inputs.len(),
            "computing"
        );
        kernel.compute(ctx, inputs)
    }
}
