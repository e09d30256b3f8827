//! Decides when a produced array can go back to the memory manager.

use super::Dep;
use crate::scheduler::ValueStore;
use std::collections::{HashMap, HashSet};
use strand_core::dependency::{DependencyTracker, Edge};
use strand_core::error::Result;
use strand_core::traits::MemoryManager;
use strand_core::types::{ArrayId, FrameIterId, NameId, VarId};
use strand_core::value::{Tensor, Value};
use tracing::{debug, trace};

#[derive(Debug)]
struct TrackedArray {
    tensor: Tensor,
    /// Every stored value key that refers to this array.
    holders: Vec<VarId>,
}

/// Array lifetimes keyed by array identity.
///
/// Each array is a dependent of a [`DependencyTracker`] whose dependees are
/// [`Dep`] obligations. When an op instance finishes, its `OpConsumer` is
/// marked satisfied and every array left without obligations is handed back
/// for release. Identity is the [`ArrayId`], so an array forwarded through
/// control-flow ops or listed in several containers is tracked and released
/// once.
#[derive(Debug)]
pub struct ArrayLifecycleTracker {
    deps: DependencyTracker<ArrayId, Dep>,
    arrays: HashMap<ArrayId, TrackedArray>,
    freed: HashSet<ArrayId>,
    deferred: Vec<ArrayId>,
    end_of_run: bool,
}

impl ArrayLifecycleTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            deps: DependencyTracker::new("array lifecycle tracker"),
            arrays: HashMap::new(),
            freed: HashSet::new(),
            deferred: Vec::new(),
            end_of_run: false,
        }
    }

    /// Pin the arrays of a placeholder, constant or variable value.
    pub fn track_leaf(&mut self, var: VarId, value: &Value, holder: Dep) {
        for tensor in value.arrays() {
            self.remember(tensor, var);
            self.deps.add_dependency(tensor.id(), holder);
        }
    }

    /// Register the obligations of freshly produced values.
    ///
    /// Each item is a stored value key, its value and the obligations of that
    /// value. Obligations are merged per array first, so an array appearing
    /// under several outputs or twice in one list is registered once.
    ///
    /// Returns arrays that nothing will ever read and that were not tracked
    /// before, when `release_unused` is set.
    pub fn track_outputs<'a, I>(&mut self, outputs: I, release_unused: bool) -> Vec<ArrayId>
    where
        I: IntoIterator<Item = (VarId, &'a Value, Vec<Dep>)>,
    {
        let mut order: Vec<ArrayId> = Vec::new();
        let mut merged: HashMap<ArrayId, Vec<Dep>> = HashMap::new();
        for (var, value, deps) in outputs {
            for tensor in value.arrays() {
                let id = tensor.id();
                self.remember(tensor, var);
                merged
                    .entry(id)
                    .or_insert_with(|| {
                        order.push(id);
                        Vec::new()
                    })
                    .extend(deps.iter().copied());
            }
        }

        let mut unused = Vec::new();
        for id in order {
            let deps = merged.remove(&id).unwrap_or_default();
            if deps.is_empty() {
                if release_unused && !self.deps.has_dependency(&id) {
                    trace!(array = %id, "output has no consumer");
                    unused.push(id);
                }
                continue;
            }
            trace!(array = %id, deps = deps.len(), "tracking output");
            self.deps.add_edges(id, deps.into_iter().map(Edge::And));
        }
        unused
    }

    /// Record that the op instance `op` producing into `frame` finished.
    ///
    /// Returns the arrays that may be released now. Arrays still held under
    /// one of `own_outputs`, and every array when `defer_all` is set, are
    /// kept until [`end_run`](Self::end_run).
    pub fn op_finished(
        &mut self,
        op: NameId,
        frame: FrameIterId,
        own_outputs: &[VarId],
        defer_all: bool,
    ) -> Result<Vec<ArrayId>> {
        self.deps.mark_satisfied(Dep::OpConsumer { op, frame }, true);
        if !self.deps.has_new_all_satisfied() {
            return Ok(Vec::new());
        }

        let mut releasable = Vec::new();
        for id in self.deps.get_new_all_satisfied_list()? {
            let own = self
                .arrays
                .get(&id)
                .is_some_and(|a| a.holders.iter().any(|h| own_outputs.contains(h)));
            if defer_all || own {
                trace!(array = %id, op = %op, "release deferred to end of run");
                self.deferred.push(id);
            } else {
                releasable.push(id);
            }
        }
        Ok(releasable)
    }

    /// Finish the run.
    ///
    /// `unexecuted` lists op instances that became ready but never ran; their
    /// obligations are dropped. `EndOfRun` is satisfied once. Returns every
    /// array that is now unobligated, every deferred array, and every array
    /// whose only pending obligations are op instances that will never run,
    /// minus anything in `returned`.
    pub fn end_run(
        &mut self,
        unexecuted: &[(NameId, FrameIterId)],
        returned: &HashSet<ArrayId>,
    ) -> Result<Vec<ArrayId>> {
        for &(op, frame) in unexecuted {
            self.deps.mark_satisfied(Dep::OpConsumer { op, frame }, true);
        }
        if !self.end_of_run {
            self.deps.mark_satisfied(Dep::EndOfRun, true);
            self.end_of_run = true;
        }

        let mut candidates = Vec::new();
        if self.deps.has_new_all_satisfied() {
            candidates.extend(self.deps.get_new_all_satisfied_list()?);
        }
        candidates.append(&mut self.deferred);

        let mut stranded: Vec<ArrayId> = self
            .arrays
            .keys()
            .copied()
            .filter(|id| self.only_dead_obligations(id))
            .collect();
        stranded.sort();
        candidates.extend(stranded);

        let mut seen = HashSet::new();
        candidates.retain(|id| {
            !returned.contains(id) && !self.freed.contains(id) && seen.insert(*id)
        });
        debug!(arrays = candidates.len(), "end of run release");
        Ok(candidates)
    }

    /// Drop the `RequestedOutput` obligation of `name` after the run.
    ///
    /// Returns the arrays that may be released as a result.
    pub fn release_requested(&mut self, name: NameId) -> Vec<ArrayId> {
        let dep = Dep::RequestedOutput(name);
        let mut ids: Vec<ArrayId> = self
            .arrays
            .keys()
            .copied()
            .filter(|id| {
                !self.freed.contains(id)
                    && self
                        .deps
                        .get_dependencies(id)
                        .is_some_and(|list| list.and.contains(&dep))
            })
            .collect();
        ids.sort();

        for id in &ids {
            self.deps.remove_dependency(id, &dep);
        }
        // Entries are re-checked below, so the queue only needs emptying.
        self.deps.discard_ready();
        ids.retain(|id| self.only_dead_obligations(id));
        ids
    }

    /// Arrays a failed run leaves behind: everything tracked that is not
    /// pinned by a holder and not yet released.
    pub fn abandoned(&self) -> Vec<ArrayId> {
        let mut ids: Vec<ArrayId> = self
            .arrays
            .keys()
            .copied()
            .filter(|id| {
                !self.freed.contains(id)
                    && !self
                        .deps
                        .get_dependencies(id)
                        .is_some_and(|list| list.and.iter().any(Dep::is_holder))
            })
            .collect();
        ids.sort();
        ids
    }

    /// Return an array to the memory manager, evict every stored value that
    /// refers to it and drop the tracker's own handle, leaving the manager
    /// as the only owner of the buffer.
    ///
    /// Returns `false` if the array was already released or is unknown.
    pub fn release(
        &mut self,
        id: ArrayId,
        memory: &dyn MemoryManager,
        store: &mut ValueStore,
    ) -> Result<bool> {
        if self.freed.contains(&id) {
            trace!(array = %id, "already released");
            return Ok(false);
        }
        let Some(tracked) = self.arrays.get(&id) else {
            return Ok(false);
        };
        memory.release(&tracked.tensor)?;
        self.freed.insert(id);
        if let Some(tracked) = self.arrays.remove(&id) {
            for var in &tracked.holders {
                store.evict(var);
            }
            trace!(array = %id, holders = tracked.holders.len(), "released");
        }
        Ok(true)
    }

    /// Whether `id` was released during this run.
    pub fn is_released(&self, id: ArrayId) -> bool {
        self.freed.contains(&id)
    }

    /// Number of arrays released during this run.
    pub fn released_count(&self) -> usize {
        self.freed.len()
    }

    /// Number of arrays waiting for the end of the run.
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Number of distinct arrays tracked and not yet released.
    pub fn tracked_count(&self) -> usize {
        self.arrays.len()
    }

    /// Current obligations of an array, satisfied or not.
    pub fn obligations(&self, id: ArrayId) -> Vec<Dep> {
        self.deps
            .get_dependencies(&id)
            .map(|list| list.and)
            .unwrap_or_default()
    }

    /// Reset for the next run.
    pub fn clear(&mut self) {
        self.deps.clear();
        self.arrays.clear();
        self.freed.clear();
        self.deferred.clear();
        self.end_of_run = false;
    }

    fn remember(&mut self, tensor: &Tensor, var: VarId) {
        let tracked = self
            .arrays
            .entry(tensor.id())
            .or_insert_with(|| TrackedArray {
                tensor: tensor.clone(),
                holders: Vec::new(),
            });
        if !tracked.holders.contains(&var) {
            tracked.holders.push(var);
        }
    }

    /// No pending obligation other than op instances, which can no longer
    /// run once the run is over.
    fn only_dead_obligations(&self, id: &ArrayId) -> bool {
        if self.freed.contains(id) {
            return false;
        }
        match self.deps.get_dependencies(id) {
            Some(list) => list
                .and
                .iter()
                .all(|d| d.is_consumer() || self.deps.is_satisfied(d)),
            None => true,
        }
    }
}

impl Default for ArrayLifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::testing::MockMemoryManager;

    fn consumer(op: u32) -> Dep {
        Dep::OpConsumer {
            op: NameId::new(op),
            frame: FrameIterId::OUTER,
        }
    }

    fn var(name: u32) -> VarId {
        VarId::outer(NameId::new(name))
    }

    #[test]
    fn released_after_last_consumer() {
        let mut tracker = ArrayLifecycleTracker::new();
        let value = Value::scalar(1.0);
        let id = value.arrays()[0].id();

        let unused = tracker.track_outputs([(var(10), &value, vec![consumer(1), consumer(2)])], true);
        assert!(unused.is_empty());

        let first = tracker.op_finished(NameId::new(1), FrameIterId::OUTER, &[], false).unwrap();
        assert!(first.is_empty());
        let second = tracker.op_finished(NameId::new(2), FrameIterId::OUTER, &[], false).unwrap();
        assert_eq!(second, vec![id]);
    }

    #[test]
    fn unconsumed_output_released_immediately() {
        let mut tracker = ArrayLifecycleTracker::new();
        let value = Value::scalar(1.0);
        let id = value.arrays()[0].id();

        assert_eq!(tracker.track_outputs([(var(10), &value, vec![])], true), vec![id]);
    }

    #[test]
    fn unconsumed_output_kept_when_disabled() {
        let mut tracker = ArrayLifecycleTracker::new();
        let value = Value::scalar(1.0);
        let id = value.arrays()[0].id();

        assert!(tracker.track_outputs([(var(10), &value, vec![])], false).is_empty());
        let released = tracker.end_run(&[], &HashSet::new()).unwrap();
        assert_eq!(released, vec![id]);
    }

    #[test]
    fn holders_never_release() {
        let mut tracker = ArrayLifecycleTracker::new();
        let value = Value::scalar(1.0);
        tracker.track_leaf(var(1), &value, Dep::PlaceholderHolder(NameId::new(1)));
        tracker.track_outputs([(var(2), &value, vec![consumer(7)])], true);

        assert!(tracker.op_finished(NameId::new(7), FrameIterId::OUTER, &[], false).unwrap().is_empty());
        assert!(tracker.end_run(&[], &HashSet::new()).unwrap().is_empty());
        assert!(tracker.abandoned().is_empty());
    }

    #[test]
    fn requested_output_survives_the_run() {
        let mut tracker = ArrayLifecycleTracker::new();
        let value = Value::scalar(1.0);
        let id = value.arrays()[0].id();
        let out = NameId::new(9);

        tracker.track_outputs([(var(9), &value, vec![consumer(3), Dep::RequestedOutput(out)])], true);
        assert!(tracker.op_finished(NameId::new(3), FrameIterId::OUTER, &[], false).unwrap().is_empty());
        assert!(tracker.end_run(&[], &HashSet::new()).unwrap().is_empty());

        assert_eq!(tracker.release_requested(out), vec![id]);
    }

    #[test]
    fn own_outputs_and_switch_outputs_are_deferred() {
        let mut tracker = ArrayLifecycleTracker::new();
        let a = Value::scalar(1.0);
        let b = Value::scalar(2.0);

        tracker.track_outputs([(var(1), &a, vec![consumer(5)])], true);
        tracker.track_outputs([(var(2), &b, vec![consumer(6)])], true);

        let own = tracker.op_finished(NameId::new(5), FrameIterId::OUTER, &[var(1)], false).unwrap();
        assert!(own.is_empty());
        let switch = tracker.op_finished(NameId::new(6), FrameIterId::OUTER, &[], true).unwrap();
        assert!(switch.is_empty());
        assert_eq!(tracker.deferred_count(), 2);

        let returned: HashSet<ArrayId> = [b.arrays()[0].id()].into_iter().collect();
        let released = tracker.end_run(&[], &returned).unwrap();
        assert_eq!(released, vec![a.arrays()[0].id()]);
    }

    #[test]
    fn unexecuted_consumers_do_not_pin_at_end_of_run() {
        let mut tracker = ArrayLifecycleTracker::new();
        let value = Value::scalar(1.0);
        let id = value.arrays()[0].id();

        tracker.track_outputs([(var(1), &value, vec![consumer(4), Dep::EndOfRun])], true);
        let released = tracker
            .end_run(&[(NameId::new(4), FrameIterId::OUTER)], &HashSet::new())
            .unwrap();
        assert_eq!(released, vec![id]);
    }

    #[test]
    fn aliased_array_is_tracked_once() {
        let mut tracker = ArrayLifecycleTracker::new();
        let tensor = Tensor::scalar(3.0);
        let id = tensor.id();
        let single = Value::Tensor(tensor.clone());
        let list = Value::List(vec![tensor.clone(), tensor]);

        tracker.track_outputs(
            [
                (var(1), &single, vec![consumer(1)]),
                (var(2), &list, vec![consumer(2)]),
            ],
            true,
        );
        assert_eq!(tracker.tracked_count(), 1);

        assert!(tracker.op_finished(NameId::new(1), FrameIterId::OUTER, &[], false).unwrap().is_empty());
        assert_eq!(
            tracker.op_finished(NameId::new(2), FrameIterId::OUTER, &[], false).unwrap(),
            vec![id]
        );
    }

    #[test]
    fn release_is_idempotent_and_evicts_holders() {
        let graph = strand_core::graph::Graph::builder()
            .placeholder("x")
            .build()
            .unwrap();
        let frames = strand_core::types::FrameArena::new();
        let memory = MockMemoryManager::new();
        let mut store = ValueStore::new();
        let mut tracker = ArrayLifecycleTracker::new();

        let key = VarId::outer(graph.lookup("x").unwrap());
        let value = Value::scalar(1.0);
        let id = value.arrays()[0].id();
        store.put(key, value.clone(), &graph, &frames).unwrap();
        tracker.track_outputs([(key, &value, vec![consumer(1)])], true);

        assert!(tracker.release(id, &memory, &mut store).unwrap());
        assert!(!tracker.release(id, &memory, &mut store).unwrap());
        assert_eq!(memory.releases_of(id), 1);
        assert!(!store.contains(&key));
        assert!(tracker.is_released(id));
        assert_eq!(tracker.released_count(), 1);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn abandoned_lists_unreleased_intermediates() {
        let mut tracker = ArrayLifecycleTracker::new();
        let leaf = Value::scalar(1.0);
        let mid = Value::scalar(2.0);
        tracker.track_leaf(var(1), &leaf, Dep::ConstantHolder(NameId::new(1)));
        tracker.track_outputs([(var(2), &mid, vec![consumer(8)])], true);

        assert_eq!(tracker.abandoned(), vec![mid.arrays()[0].id()]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut tracker = ArrayLifecycleTracker::new();
        let value = Value::scalar(1.0);
        tracker.track_outputs([(var(1), &value, vec![consumer(1)])], true);
        tracker.end_run(&[], &HashSet::new()).unwrap();
        tracker.clear();

        assert_eq!(tracker.tracked_count(), 0);
        assert_eq!(tracker.released_count(), 0);
        assert!(tracker.obligations(value.arrays()[0].id()).is_empty());
    }
}
