//! Callbacks observing a run.

use std::fmt;
use std::sync::Arc;
use strand_core::types::FrameIter;
use strand_core::value::Value;

/// Handle of a listener registered on one session.
///
/// Handles are never reused within a session, so a stale handle cannot
/// remove a listener registered later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

impl ListenerId {
    /// Registration index within the session.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Observer of op execution and value availability.
///
/// Callbacks run synchronously on the dispatch thread, in registration order.
/// Every method has an empty default body.
pub trait SessionListener: Send + Sync {
    /// An op instance is about to run.
    fn pre_op_execution(&self, _op: &str, _frame: &FrameIter) {}

    /// An op instance ran and produced `outputs`. For a Switch only the taken
    /// output is listed.
    fn op_execution(&self, _op: &str, _frame: &FrameIter, _outputs: &[Value]) {}

    /// A value became available.
    fn activation_available(&self, _variable: &str, _frame: &FrameIter, _value: &Value) {}
}

/// Listeners registered on a session.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Vec<(ListenerId, Arc<dyn SessionListener>)>,
    next: u32,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: Arc<dyn SessionListener>) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        match self.entries.iter().position(|(entry, _)| *entry == id) {
            Some(at) => {
                self.entries.remove(at);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn each(&self, mut f: impl FnMut(&dyn SessionListener)) {
        for (_, listener) in &self.entries {
            f(listener.as_ref());
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<ListenerId> = self.entries.iter().map(|(id, _)| *id).collect();
        f.debug_struct("Listeners").field("ids", &ids).finish()
    }
}
