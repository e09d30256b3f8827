//! Interned storage for variable, op and frame names.
//!
//! Scheduling keys (`ExecStep`, `VarId`, frame records) hold a [`NameId`]
//! instead of a `String`, so hashing and comparing them never touches string
//! data. The text lives once in a [`NameTable`] owned by the graph.

use super::frame::OUTER_FRAME;
use super::ids::NameId;
use std::collections::HashMap;

/// Index of the outer frame name in every table.
pub(crate) const OUTER_FRAME_NAME: NameId = NameId::new(1);

/// A deduplicating name store.
///
/// Index 0 is always the empty name and index 1 is always the outer frame
/// name, so both are valid in any table.
#[derive(Debug, Clone)]
pub struct NameTable {
    names: Vec<String>,
    lookup: HashMap<String, NameId>,
}

impl NameTable {
    /// Create a table with the reserved names pre-inserted.
    pub fn new() -> Self {
        let mut table = Self {
            names: Vec::new(),
            lookup: HashMap::new(),
        };
        table.intern("");
        table.intern(OUTER_FRAME);
        table
    }

    /// Intern a name, returning its handle.
    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = NameId::new(self.names.len() as u32);
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        id
    }

    /// Look up a name without interning it.
    pub fn get(&self, name: &str) -> Option<NameId> {
        self.lookup.get(name).copied()
    }

    /// Resolve a handle to its text. Unknown handles resolve to `""`.
    pub fn resolve(&self, id: NameId) -> &str {
        self.names.get(id.index()).map_or("", String::as_str)
    }

    /// Number of interned names, including the reserved ones.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether only the reserved names are present.
    pub fn is_empty(&self) -> bool {
        self.names.len() <= 2
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}
