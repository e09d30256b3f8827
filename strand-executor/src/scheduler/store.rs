//! Values produced during a run, keyed by variable and frame.

use std::collections::HashMap;
use strand_core::error::{Result, StrandError};
use strand_core::graph::Graph;
use strand_core::types::{FrameArena, VarId};
use strand_core::value::Value;

/// Write-once map from [`VarId`] to value.
#[derive(Debug, Default)]
pub struct ValueStore {
    values: HashMap<VarId, Value>,
}

impl ValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value. A key can be written once per run.
    pub fn put(&mut self, var: VarId, value: Value, graph: &Graph, frames: &FrameArena) -> Result<()> {
        if self.values.contains_key(&var) {
            return Err(StrandError::ValueOverwrite {
                variable: graph.name(var.name).to_string(),
                frame: frames.to_frame_iter(var.frame, graph.names()).to_string(),
            });
        }
        self.values.insert(var, value);
        Ok(())
    }

    /// Value stored under `var`.
    pub fn get(&self, var: &VarId) -> Option<&Value> {
        self.values.get(var)
    }

    /// Whether `var` holds a value.
    pub fn contains(&self, var: &VarId) -> bool {
        self.values.contains_key(var)
    }

    /// Drop the value stored under `var`.
    pub fn evict(&mut self, var: &VarId) -> Option<Value> {
        self.values.remove(var)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop every value.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::types::FrameIterId;

    fn graph() -> Graph {
        Graph::builder().placeholder("a").build().unwrap()
    }

    #[test]
    fn put_then_get() {
        let graph = graph();
        let a = VarId::outer(graph.lookup("a").unwrap());
        let frames = FrameArena::new();
        let mut store = ValueStore::new();

        store.put(a, Value::scalar(1.0), &graph, &frames).unwrap();
        assert_eq!(store.get(&a).and_then(Value::as_scalar), Some(1.0));
        assert!(store.contains(&a));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn second_write_is_rejected() {
        let graph = graph();
        let a = VarId::outer(graph.lookup("a").unwrap());
        let frames = FrameArena::new();
        let mut store = ValueStore::new();

        store.put(a, Value::scalar(1.0), &graph, &frames).unwrap();
        let err = store.put(a, Value::scalar(2.0), &graph, &frames).unwrap_err();
        assert_eq!(err.code(), "E311");
        assert_eq!(store.get(&a).and_then(Value::as_scalar), Some(1.0));
    }

    #[test]
    fn keys_differ_by_frame() {
        let graph = graph();
        let name = graph.lookup("a").unwrap();
        let frames = FrameArena::new();
        let mut store = ValueStore::new();

        store.put(VarId::outer(name), Value::scalar(1.0), &graph, &frames).unwrap();
        store
            .put(VarId::new(name, FrameIterId::new(3)), Value::scalar(2.0), &graph, &frames)
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn evict_and_clear() {
        let graph = graph();
        let a = VarId::outer(graph.lookup("a").unwrap());
        let frames = FrameArena::new();
        let mut store = ValueStore::new();

        store.put(a, Value::scalar(1.0), &graph, &frames).unwrap();
        assert!(store.evict(&a).is_some());
        assert!(!store.contains(&a));

        store.put(a, Value::scalar(3.0), &graph, &frames).unwrap();
        store.clear();
        assert!(store.is_empty());
    }
}
