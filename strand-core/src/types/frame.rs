//! Frames, iterations and the arena that interns them.
//!
//! A frame is the execution scope of a loop body; a loop re-enters the same
//! frame with an incremented iteration, and frames nest. Every distinct
//! (frame, iteration, parent) triple is stored once in a [`FrameArena`] and
//! referred to by a [`FrameIterId`]. Parents are arena indices, so walking up
//! the tree is a plain loop and the structure holds no reference cycles.

use super::ids::{FrameIterId, NameId};
use super::names::{NameTable, OUTER_FRAME_NAME};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Name of the outermost frame.
pub const OUTER_FRAME: &str = "main";

/// One interned (frame, iteration, parent) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRecord {
    /// Frame name.
    pub frame: NameId,
    /// Iteration within the frame.
    pub iteration: u32,
    /// Enclosing frame record, `None` only for the outer frame.
    pub parent: Option<FrameIterId>,
}

/// Arena of frame records with parent back-references.
#[derive(Debug, Clone)]
pub struct FrameArena {
    records: Vec<FrameRecord>,
    index: HashMap<FrameRecord, FrameIterId>,
}

impl FrameArena {
    /// Create an arena holding only the outer frame at iteration 0.
    pub fn new() -> Self {
        let mut arena = Self {
            records: Vec::new(),
            index: HashMap::new(),
        };
        arena.intern(FrameRecord {
            frame: OUTER_FRAME_NAME,
            iteration: 0,
            parent: None,
        });
        arena
    }

    /// The outer frame.
    #[must_use]
    pub fn outer(&self) -> FrameIterId {
        FrameIterId::OUTER
    }

    /// Intern a record, returning the existing handle if already present.
    pub fn intern(&mut self, record: FrameRecord) -> FrameIterId {
        if let Some(&id) = self.index.get(&record) {
            return id;
        }
        let id = FrameIterId::new(self.records.len() as u32);
        self.records.push(record);
        self.index.insert(record, id);
        id
    }

    /// Get the record behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle did not come from this arena.
    pub fn record(&self, id: FrameIterId) -> &FrameRecord {
        &self.records[id.index()]
    }

    /// Try to get the record behind a handle.
    pub fn get(&self, id: FrameIterId) -> Option<&FrameRecord> {
        self.records.get(id.index())
    }

    /// The enclosing frame, `None` for the outer frame.
    pub fn parent(&self, id: FrameIterId) -> Option<FrameIterId> {
        self.record(id).parent
    }

    /// Same frame and parent at another iteration.
    pub fn with_iteration(&mut self, id: FrameIterId, iteration: u32) -> FrameIterId {
        let record = FrameRecord {
            iteration,
            ..*self.record(id)
        };
        self.intern(record)
    }

    /// Same frame and parent at the following iteration.
    pub fn next_iteration(&mut self, id: FrameIterId) -> FrameIterId {
        let iteration = self.record(id).iteration + 1;
        self.with_iteration(id, iteration)
    }

    /// Same frame and parent at the preceding iteration, `None` at iteration 0.
    pub fn previous_iteration(&mut self, id: FrameIterId) -> Option<FrameIterId> {
        let iteration = self.record(id).iteration.checked_sub(1)?;
        Some(self.with_iteration(id, iteration))
    }

    /// Iteration 0 of the child frame `frame` entered from `id`.
    pub fn enter(&mut self, id: FrameIterId, frame: NameId) -> FrameIterId {
        self.intern(FrameRecord {
            frame,
            iteration: 0,
            parent: Some(id),
        })
    }

    /// Iterate from `id` up to the outer frame, `id` first.
    pub fn ancestors(&self, id: FrameIterId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: Some(id),
        }
    }

    /// Nesting depth, 0 for the outer frame.
    pub fn depth(&self, id: FrameIterId) -> usize {
        self.ancestors(id).count() - 1
    }

    /// Highest iteration seen in any frame.
    pub fn max_iteration(&self) -> u32 {
        self.records.iter().map(|r| r.iteration).max().unwrap_or(0)
    }

    /// Find the handle of an owned frame description without interning it.
    pub fn find(&self, frame: &FrameIter, names: &NameTable) -> Option<FrameIterId> {
        let mut chain = Vec::new();
        let mut cursor = Some(frame);
        while let Some(f) = cursor {
            chain.push(f);
            cursor = f.parent.as_deref();
        }

        let mut parent = None;
        for f in chain.into_iter().rev() {
            let record = FrameRecord {
                frame: names.get(&f.frame)?,
                iteration: f.iteration,
                parent,
            };
            parent = Some(*self.index.get(&record)?);
        }
        parent
    }

    /// Build the owned description of a handle.
    pub fn to_frame_iter(&self, id: FrameIterId, names: &NameTable) -> FrameIter {
        let chain: Vec<FrameIterId> = self.ancestors(id).collect();
        let mut built: Option<FrameIter> = None;
        for fid in chain.into_iter().rev() {
            let record = self.record(fid);
            built = Some(FrameIter {
                frame: names.resolve(record.frame).to_string(),
                iteration: record.iteration,
                parent: built.map(Box::new),
            });
        }
        built.unwrap_or_else(FrameIter::outer)
    }

    /// Number of interned records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether only the outer frame is present.
    pub fn is_empty(&self) -> bool {
        self.records.len() <= 1
    }

    /// Drop every record except the outer frame.
    pub fn clear(&mut self) {
        self.records.truncate(1);
        self.index.retain(|_, id| *id == FrameIterId::OUTER);
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a frame and its ancestors.
pub struct Ancestors<'a> {
    arena: &'a FrameArena,
    next: Option<FrameIterId>,
}

impl Iterator for Ancestors<'_> {
    type Item = FrameIterId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.arena.get(current).and_then(|r| r.parent);
        Some(current)
    }
}

/// Owned (frame, iteration, parent) description, used at API boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameIter {
    /// Frame name.
    pub frame: String,
    /// Iteration within the frame.
    pub iteration: u32,
    /// Enclosing frame.
    pub parent: Option<Box<FrameIter>>,
}

impl FrameIter {
    /// The outer frame at iteration 0.
    pub fn outer() -> Self {
        Self {
            frame: OUTER_FRAME.to_string(),
            iteration: 0,
            parent: None,
        }
    }

    /// Create a frame description.
    pub fn new(frame: impl Into<String>, iteration: u32, parent: Option<FrameIter>) -> Self {
        Self {
            frame: frame.into(),
            iteration,
            parent: parent.map(Box::new),
        }
    }

    /// Whether this is the outer frame.
    pub fn is_outer(&self) -> bool {
        self.parent.is_none() && self.frame == OUTER_FRAME
    }
}

impl fmt::Display for FrameIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.frame, self.iteration)?;
        let mut parent = self.parent.as_deref();
        while let Some(p) = parent {
            write!(f, " < {}/{}", p.frame, p.iteration)?;
            parent = p.parent.as_deref();
        }
        Ok(())
    }
}
