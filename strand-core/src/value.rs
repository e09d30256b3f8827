//! Tensor values flowing between ops.
//!
//! Storage is deliberately simple: a shared buffer of `f64` tagged with a
//! logical data type and a shape. What matters to the scheduler is the
//! [`ArrayId`] identity carried by every tensor, which is how release
//! bookkeeping tells one allocation from another.

use crate::error::{Result, StrandError};
use crate::types::ArrayId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Logical element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Boolean, stored as 0.0 / 1.0.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
}

impl DataType {
    /// Size of one element in bytes.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        };
        f.write_str(s)
    }
}

/// Data type and shape of an array, as requested from a memory manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayDescriptor {
    /// Element type.
    pub dtype: DataType,
    /// Dimensions. Empty for a scalar.
    pub shape: Vec<usize>,
}

impl ArrayDescriptor {
    /// Create a descriptor.
    pub fn new(dtype: DataType, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            dtype,
            shape: shape.into(),
        }
    }

    /// A rank-0 descriptor.
    pub fn scalar(dtype: DataType) -> Self {
        Self::new(dtype, Vec::new())
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage size in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.len() * self.dtype.width()
    }
}

impl fmt::Display for ArrayDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.dtype, self.shape)
    }
}

/// A dense array with a process-unique identity.
///
/// Cloning a tensor shares its storage and keeps its identity; the clone is
/// another reference to the same array.
#[derive(Debug, Clone)]
pub struct Tensor {
    id: ArrayId,
    desc: ArrayDescriptor,
    data: Arc<Vec<f64>>,
}

impl Tensor {
    /// Create a tensor, checking that `data` matches the shape.
    pub fn new(dtype: DataType, shape: impl Into<Vec<usize>>, data: Vec<f64>) -> Result<Self> {
        let desc = ArrayDescriptor::new(dtype, shape);
        if desc.len() != data.len() {
            return Err(StrandError::InvalidTensor {
                cause: format!(
                    "shape {:?} needs {} elements, got {}",
                    desc.shape,
                    desc.len(),
                    data.len()
                ),
            });
        }
        Ok(Self {
            id: ArrayId::next(),
            desc,
            data: Arc::new(data),
        })
    }

    /// A zero-filled tensor.
    pub fn zeros(desc: &ArrayDescriptor) -> Self {
        Self {
            id: ArrayId::next(),
            data: Arc::new(vec![0.0; desc.len()]),
            desc: desc.clone(),
        }
    }

    /// A `float64` scalar.
    pub fn scalar(value: f64) -> Self {
        Self::from_scalar(DataType::Float64, value)
    }

    /// An `int64` scalar.
    pub fn scalar_i64(value: i64) -> Self {
        Self::from_scalar(DataType::Int64, value as f64)
    }

    /// A `bool` scalar.
    pub fn scalar_bool(value: bool) -> Self {
        Self::from_scalar(DataType::Bool, if value { 1.0 } else { 0.0 })
    }

    /// A rank-1 `float64` tensor.
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            id: ArrayId::next(),
            desc: ArrayDescriptor::new(DataType::Float64, vec![values.len()]),
            data: Arc::new(values),
        }
    }

    fn from_scalar(dtype: DataType, value: f64) -> Self {
        Self {
            id: ArrayId::next(),
            desc: ArrayDescriptor::scalar(dtype),
            data: Arc::new(vec![value]),
        }
    }

    /// Identity of the underlying array.
    #[must_use]
    pub fn id(&self) -> ArrayId {
        self.id
    }

    /// Element type.
    #[must_use]
    pub fn dtype(&self) -> DataType {
        self.desc.dtype
    }

    /// Dimensions.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.desc.shape
    }

    /// Data type and shape.
    #[must_use]
    pub fn descriptor(&self) -> &ArrayDescriptor {
        &self.desc
    }

    /// Elements in row-major order.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable elements.
    ///
    /// A shared buffer is copied first and the copy gets a new identity, so
    /// two buffers never carry the same [`ArrayId`].
    pub fn data_mut(&mut self) -> &mut [f64] {
        if Arc::get_mut(&mut self.data).is_none() {
            self.id = ArrayId::next();
        }
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Whether no other handle shares the buffer.
    pub(crate) fn is_unique(&self) -> bool {
        Arc::strong_count(&self.data) == 1
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the tensor holds exactly one element.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }

    /// The single element of a one-element tensor.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        if self.is_scalar() { Some(self.data[0]) } else { None }
    }

    /// The value of a boolean scalar. `None` for any other data type or size.
    #[must_use]
    pub fn as_bool_scalar(&self) -> Option<bool> {
        if self.desc.dtype != DataType::Bool {
            return None;
        }
        self.as_scalar().map(|v| v != 0.0)
    }

    /// Element-wise equality of type, shape and data, ignoring identity.
    #[must_use]
    pub fn same_values(&self, other: &Tensor) -> bool {
        self.desc == other.desc && self.data == other.data
    }

    /// Give the storage a new identity. Used when a cached array is handed out
    /// again so stale references cannot be mistaken for the new owner.
    pub(crate) fn reissue(mut self) -> Self {
        self.id = ArrayId::next();
        self
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_scalar() {
            Some(v) if self.desc.shape.is_empty() => write!(f, "{}({})", self.desc.dtype, v),
            _ => write!(f, "{}{:?}", self.desc, self.data),
        }
    }
}

/// A value stored for a variable: a single tensor or a list of tensors.
///
/// The same tensor may appear in several lists; identity is tracked per
/// tensor, never per container.
#[derive(Debug, Clone)]
pub enum Value {
    /// One tensor.
    Tensor(Tensor),
    /// An ordered list of tensors.
    List(Vec<Tensor>),
}

impl Value {
    /// A `float64` scalar value.
    pub fn scalar(value: f64) -> Self {
        Self::Tensor(Tensor::scalar(value))
    }

    /// A `bool` scalar value.
    pub fn bool(value: bool) -> Self {
        Self::Tensor(Tensor::scalar_bool(value))
    }

    /// Every tensor held by this value.
    pub fn arrays(&self) -> &[Tensor] {
        match self {
            Self::Tensor(t) => std::slice::from_ref(t),
            Self::List(items) => items,
        }
    }

    /// The tensor of a single-tensor value.
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Self::Tensor(t) => Some(t),
            Self::List(_) => None,
        }
    }

    /// Single element of a one-element tensor value.
    pub fn as_scalar(&self) -> Option<f64> {
        self.as_tensor().and_then(Tensor::as_scalar)
    }

    /// Value of a boolean scalar.
    pub fn as_bool_scalar(&self) -> Option<bool> {
        self.as_tensor().and_then(Tensor::as_bool_scalar)
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Self::Tensor(t)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tensor(t) => t.fmt(f),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    t.fmt(f)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_keeps_identity() {
        let t = Tensor::scalar(5.0);
        let c = t.clone();
        assert_eq!(t.id(), c.id());
        assert_eq!(c.as_scalar(), Some(5.0));
    }

    #[test]
    fn new_checks_shape() {
        assert!(Tensor::new(DataType::Float64, vec![2, 2], vec![1.0; 4]).is_ok());
        let err = Tensor::new(DataType::Float64, vec![3], vec![1.0]).unwrap_err();
        assert_eq!(err.code(), "E404");
    }

    #[test]
    fn bool_scalar_requires_bool_dtype() {
        assert_eq!(Tensor::scalar_bool(true).as_bool_scalar(), Some(true));
        assert_eq!(Tensor::scalar(1.0).as_bool_scalar(), None);
        let not_scalar = Tensor::new(DataType::Bool, vec![2], vec![1.0, 0.0]).unwrap();
        assert_eq!(not_scalar.as_bool_scalar(), None);
    }

    #[test]
    fn data_mut_detaches_shared_storage() {
        let a = Tensor::vector(vec![1.0, 2.0]);
        let mut b = a.clone();
        b.data_mut()[0] = 9.0;
        assert_eq!(a.data(), &[1.0, 2.0]);
        assert_eq!(b.data(), &[9.0, 2.0]);
        assert_ne!(a.id(), b.id());
        assert!(a.is_unique() && b.is_unique());
    }

    #[test]
    fn data_mut_on_unique_storage_keeps_identity() {
        let mut t = Tensor::vector(vec![1.0, 2.0]);
        let id = t.id();
        let before = t.data().as_ptr();
        t.data_mut()[1] = 3.0;
        assert_eq!(t.id(), id);
        assert_eq!(t.data().as_ptr(), before);
    }

    #[test]
    fn reissue_changes_identity_only() {
        let a = Tensor::vector(vec![1.0]);
        let b = a.clone().reissue();
        assert_ne!(a.id(), b.id());
        assert!(a.same_values(&b));
    }

    #[test]
    fn list_exposes_every_array() {
        let t = Tensor::scalar(1.0);
        let list = Value::List(vec![t.clone(), t.clone()]);
        assert_eq!(list.arrays().len(), 2);
        assert!(list.as_tensor().is_none());
        assert_eq!(list.to_string(), "[float64(1), float64(1)]");
    }

    #[test]
    fn descriptor_sizes() {
        let d = ArrayDescriptor::new(DataType::Float32, vec![4, 8]);
        assert_eq!(d.len(), 32);
        assert_eq!(d.byte_size(), 128);
        assert_eq!(ArrayDescriptor::scalar(DataType::Bool).len(), 1);
    }
}
