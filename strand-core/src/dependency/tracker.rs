//! Interned AND/OR dependency tracker.

use crate::error::{Result, StrandError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::trace;

/// One dependency owned by a dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge<D> {
    /// Satisfied only when the dependee is satisfied.
    And(D),
    /// Satisfied when either dependee is satisfied.
    Or(D, D),
}

/// Snapshot of the dependencies registered for one dependent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyList<T, D> {
    /// The dependent.
    pub dependent: T,
    /// AND dependees, in registration order.
    pub and: Vec<D>,
    /// OR groups, in registration order.
    pub or: Vec<(D, D)>,
}

#[derive(Debug)]
struct DependentSlot<T> {
    key: T,
    and_deps: Vec<u32>,
    or_groups: Vec<u32>,
    /// AND edges whose dependee is not satisfied. Frozen once `ready` is set.
    unsatisfied_and: u32,
    /// OR groups with no satisfied side. Frozen once `ready` is set.
    unsatisfied_or: u32,
    ready: bool,
}

#[derive(Debug)]
struct DependeeSlot<D> {
    key: D,
    satisfied: bool,
    and_dependents: Vec<u32>,
    or_groups: Vec<u32>,
}

#[derive(Debug)]
struct OrGroup {
    dependent: u32,
    sides: [u32; 2],
    satisfied: bool,
    removed: bool,
}

/// Tracks which dependents have all of their dependencies satisfied.
///
/// Dependents (`T`) and dependees (`D`) are interned to dense integer handles
/// on first sight; every later operation works on those handles. Each
/// dependent keeps a count of unsatisfied AND edges and of OR groups with no
/// satisfied side, so marking a dependee satisfied only touches the edges
/// that point at it.
///
/// A dependent whose counts reach zero is appended to a FIFO ready queue
/// exactly once. From then on it is settled: further edges, removals and
/// un-satisfying its dependees do not affect it until [`clear`](Self::clear).
#[derive(Debug)]
pub struct DependencyTracker<T, D> {
    label: &'static str,
    dependents: Vec<DependentSlot<T>>,
    dependent_index: HashMap<T, u32>,
    dependees: Vec<DependeeSlot<D>>,
    dependee_index: HashMap<D, u32>,
    or_groups: Vec<OrGroup>,
    and_edges: HashSet<(u32, u32)>,
    or_edges: HashSet<(u32, u32, u32)>,
    ready: VecDeque<u32>,
}

impl<T, D> DependencyTracker<T, D>
where
    T: Clone + Eq + Hash + Debug,
    D: Clone + Eq + Hash + Debug,
{
    /// Create an empty tracker. `label` names it in logs and errors.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            dependents: Vec::new(),
            dependent_index: HashMap::new(),
            dependees: Vec::new(),
            dependee_index: HashMap::new(),
            or_groups: Vec::new(),
            and_edges: HashSet::new(),
            or_edges: HashSet::new(),
            ready: VecDeque::new(),
        }
    }

    /// Register an AND edge: `dependent` needs `dependee` to be satisfied.
    pub fn add_dependency(&mut self, dependent: T, dependee: D) {
        self.add_edges(dependent, [Edge::And(dependee)]);
    }

    /// Register an OR group: `dependent` needs `a` or `b` to be satisfied.
    pub fn add_or_dependency(&mut self, dependent: T, a: D, b: D) {
        self.add_edges(dependent, [Edge::Or(a, b)]);
    }

    /// Register several edges, evaluating the dependent once at the end.
    ///
    /// Registering the full edge set of a dependent in one call prevents it
    /// from becoming ready on a satisfied first edge before the rest exist.
    pub fn add_edges<I>(&mut self, dependent: T, edges: I)
    where
        I: IntoIterator<Item = Edge<D>>,
    {
        let y = self.intern_dependent(dependent);
        if self.dependents[y as usize].ready {
            trace!(tracker = self.label, dependent = ?self.dependents[y as usize].key, "edges ignored, dependent already satisfied");
            return;
        }
        for edge in edges {
            match edge {
                Edge::And(x) => {
                    let x = self.intern_dependee(x);
                    self.link_and(y, x);
                }
                Edge::Or(a, b) => {
                    let a = self.intern_dependee(a);
                    let b = self.intern_dependee(b);
                    self.link_or(y, a, b);
                }
            }
        }
        self.evaluate(y);
    }

    /// Set whether `dependee` is satisfied.
    ///
    /// Becoming satisfied may move dependents to the ready queue. Becoming
    /// unsatisfied again only affects dependents that are not yet ready.
    pub fn mark_satisfied(&mut self, dependee: D, satisfied: bool) {
        let x = self.intern_dependee(dependee);
        if self.dependees[x as usize].satisfied == satisfied {
            return;
        }
        self.dependees[x as usize].satisfied = satisfied;

        for k in 0..self.dependees[x as usize].and_dependents.len() {
            let y = self.dependees[x as usize].and_dependents[k] as usize;
            if self.dependents[y].ready {
                continue;
            }
            if satisfied {
                self.dependents[y].unsatisfied_and -= 1;
                self.evaluate(y as u32);
            } else {
                self.dependents[y].unsatisfied_and += 1;
            }
        }

        for k in 0..self.dependees[x as usize].or_groups.len() {
            let g = self.dependees[x as usize].or_groups[k] as usize;
            let group = &self.or_groups[g];
            if group.removed {
                continue;
            }
            let y = group.dependent as usize;
            if satisfied {
                if group.satisfied {
                    continue;
                }
                self.or_groups[g].satisfied = true;
                if !self.dependents[y].ready {
                    self.dependents[y].unsatisfied_or -= 1;
                    self.evaluate(y as u32);
                }
            } else {
                if !group.satisfied {
                    continue;
                }
                let other_side = group
                    .sides
                    .iter()
                    .any(|&s| self.dependees[s as usize].satisfied);
                if other_side {
                    continue;
                }
                self.or_groups[g].satisfied = false;
                if !self.dependents[y].ready {
                    self.dependents[y].unsatisfied_or += 1;
                }
            }
        }
    }

    /// Remove the AND edge `dependent -> dependee` and every OR group of
    /// `dependent` that contains `dependee`.
    ///
    /// A ready dependent stays ready. A dependent that is left with only
    /// satisfied dependencies becomes ready.
    pub fn remove_dependency(&mut self, dependent: &T, dependee: &D) {
        let (Some(&y), Some(&x)) = (
            self.dependent_index.get(dependent),
            self.dependee_index.get(dependee),
        ) else {
            return;
        };
        let settled = self.dependents[y as usize].ready;

        if self.and_edges.remove(&(y, x)) {
            self.dependents[y as usize].and_deps.retain(|&d| d != x);
            self.dependees[x as usize].and_dependents.retain(|&d| d != y);
            if !settled && !self.dependees[x as usize].satisfied {
                self.dependents[y as usize].unsatisfied_and -= 1;
            }
        }

        let doomed: Vec<u32> = self.dependents[y as usize]
            .or_groups
            .iter()
            .copied()
            .filter(|&g| self.or_groups[g as usize].sides.contains(&x))
            .collect();
        for g in doomed {
            let [a, b] = self.or_groups[g as usize].sides;
            self.or_groups[g as usize].removed = true;
            self.or_edges.remove(&(y, a.min(b), a.max(b)));
            self.dependents[y as usize].or_groups.retain(|&o| o != g);
            self.dependees[a as usize].or_groups.retain(|&o| o != g);
            self.dependees[b as usize].or_groups.retain(|&o| o != g);
            if !settled && !self.or_groups[g as usize].satisfied {
                self.dependents[y as usize].unsatisfied_or -= 1;
            }
        }

        self.evaluate(y);
    }

    /// Dependencies registered for `dependent`, if any were ever added.
    pub fn get_dependencies(&self, dependent: &T) -> Option<DependencyList<T, D>> {
        let &y = self.dependent_index.get(dependent)?;
        let slot = &self.dependents[y as usize];
        Some(DependencyList {
            dependent: slot.key.clone(),
            and: slot
                .and_deps
                .iter()
                .map(|&x| self.dependees[x as usize].key.clone())
                .collect(),
            or: slot
                .or_groups
                .iter()
                .map(|&g| {
                    let [a, b] = self.or_groups[g as usize].sides;
                    (
                        self.dependees[a as usize].key.clone(),
                        self.dependees[b as usize].key.clone(),
                    )
                })
                .collect(),
        })
    }

    /// Whether `dependent` has at least one registered edge.
    pub fn has_dependency(&self, dependent: &T) -> bool {
        self.dependent_index.get(dependent).is_some_and(|&y| {
            let slot = &self.dependents[y as usize];
            !slot.and_deps.is_empty() || !slot.or_groups.is_empty()
        })
    }

    /// Whether `dependee` is currently satisfied.
    pub fn is_satisfied(&self, dependee: &D) -> bool {
        self.dependee_index
            .get(dependee)
            .is_some_and(|&x| self.dependees[x as usize].satisfied)
    }

    /// Whether `dependent` has ever become ready.
    pub fn is_all_satisfied(&self, dependent: &T) -> bool {
        self.dependent_index
            .get(dependent)
            .is_some_and(|&y| self.dependents[y as usize].ready)
    }

    /// Whether the ready queue holds anything.
    pub fn has_new_all_satisfied(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Number of queued ready dependents.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Dequeue the oldest ready dependent.
    pub fn get_new_all_satisfied(&mut self) -> Result<T> {
        let y = self.ready.pop_front().ok_or(StrandError::NoReadyItems {
            tracker: self.label,
        })?;
        Ok(self.dependents[y as usize].key.clone())
    }

    /// Drain every ready dependent in queue order.
    pub fn get_new_all_satisfied_list(&mut self) -> Result<Vec<T>> {
        if self.ready.is_empty() {
            return Err(StrandError::NoReadyItems {
                tracker: self.label,
            });
        }
        Ok(self
            .ready
            .drain(..)
            .map(|y| self.dependents[y as usize].key.clone())
            .collect())
    }

    /// Empty the ready queue without reading it. Returns how many dependents
    /// were dropped; they stay satisfied and are never queued again.
    pub fn discard_ready(&mut self) -> usize {
        let dropped = self.ready.len();
        self.ready.clear();
        dropped
    }

    /// Dequeue the first ready dependent matching `predicate`, keeping the
    /// order of the rest. `Ok(None)` when nothing matches.
    pub fn get_first_new_all_satisfied_matching<F>(&mut self, mut predicate: F) -> Result<Option<T>>
    where
        F: FnMut(&T) -> bool,
    {
        if self.ready.is_empty() {
            return Err(StrandError::NoReadyItems {
                tracker: self.label,
            });
        }
        let position = self
            .ready
            .iter()
            .position(|&y| predicate(&self.dependents[y as usize].key));
        Ok(position
            .and_then(|p| self.ready.remove(p))
            .map(|y| self.dependents[y as usize].key.clone()))
    }

    /// Number of distinct dependents seen.
    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    /// Reset to the empty state.
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.dependent_index.clear();
        self.dependees.clear();
        self.dependee_index.clear();
        self.or_groups.clear();
        self.and_edges.clear();
        self.or_edges.clear();
        self.ready.clear();
    }

    fn intern_dependent(&mut self, key: T) -> u32 {
        if let Some(&y) = self.dependent_index.get(&key) {
            return y;
        }
        let y = self.dependents.len() as u32;
        self.dependent_index.insert(key.clone(), y);
        self.dependents.push(DependentSlot {
            key,
            and_deps: Vec::new(),
            or_groups: Vec::new(),
            unsatisfied_and: 0,
            unsatisfied_or: 0,
            ready: false,
        });
        y
    }

    fn intern_dependee(&mut self, key: D) -> u32 {
        if let Some(&x) = self.dependee_index.get(&key) {
            return x;
        }
        let x = self.dependees.len() as u32;
        self.dependee_index.insert(key.clone(), x);
        self.dependees.push(DependeeSlot {
            key,
            satisfied: false,
            and_dependents: Vec::new(),
            or_groups: Vec::new(),
        });
        x
    }

    fn link_and(&mut self, y: u32, x: u32) {
        if !self.and_edges.insert((y, x)) {
            return;
        }
        self.dependents[y as usize].and_deps.push(x);
        self.dependees[x as usize].and_dependents.push(y);
        if !self.dependees[x as usize].satisfied {
            self.dependents[y as usize].unsatisfied_and += 1;
        }
    }

    fn link_or(&mut self, y: u32, a: u32, b: u32) {
        if !self.or_edges.insert((y, a.min(b), a.max(b))) {
            return;
        }
        let g = self.or_groups.len() as u32;
        let satisfied = self.dependees[a as usize].satisfied || self.dependees[b as usize].satisfied;
        self.or_groups.push(OrGroup {
            dependent: y,
            sides: [a, b],
            satisfied,
            removed: false,
        });
        self.dependents[y as usize].or_groups.push(g);
        self.dependees[a as usize].or_groups.push(g);
        if b != a {
            self.dependees[b as usize].or_groups.push(g);
        }
        if !satisfied {
            self.dependents[y as usize].unsatisfied_or += 1;
        }
    }

    fn evaluate(&mut self, y: u32) {
        let slot = &mut self.dependents[y as usize];
        if slot.ready || slot.unsatisfied_and > 0 || slot.unsatisfied_or > 0 {
            return;
        }
        if slot.and_deps.is_empty() && slot.or_groups.is_empty() {
            return;
        }
        slot.ready = true;
        self.ready.push_back(y);
        trace!(tracker = self.label, dependent = ?slot.key, "all dependencies satisfied");
    }
}

impl<T, D> Default for DependencyTracker<T, D>
where
    T: Clone + Eq + Hash + Debug,
    D: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new("dependency tracker")
    }
}
