//! Strongly-typed identifiers for interned names, frames and arrays.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Interned handle for a variable, op or frame name.
///
/// Handles are only meaningful relative to the [`NameTable`](super::NameTable)
/// that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NameId(u32);

impl NameId {
    /// The empty name. Used as the name of the synthetic root step.
    pub const EMPTY: Self = Self(0);

    /// Create a handle from a raw table index.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw table index.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name_{}", self.0)
    }
}

/// Interned handle for a (frame, iteration, parent) record in a
/// [`FrameArena`](super::FrameArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameIterId(u32);

impl FrameIterId {
    /// The outermost frame. Always the first record of an arena.
    pub const OUTER: Self = Self(0);

    /// Create a handle from a raw arena index.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw arena index.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameIterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame_{}", self.0)
    }
}

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one array allocation.
///
/// Two tensors share an `ArrayId` only when they are views of the same
/// storage, so release bookkeeping is keyed by this handle rather than by
/// structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArrayId(u64);

impl ArrayId {
    /// Allocate a fresh identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw identity value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "array_{}", self.0)
    }
}
