//! The session: one graph, many runs.
//!
//! A run walks the subgraph of the request step by step. A step is an op,
//! leaf or Switch branch at one (frame, iteration). Steps become ready in a
//! [`DependencyTracker`] keyed by [`ExecStep`]. Dispatching a step stores its
//! values and registers the steps of every consumer in the frame the
//! consumer runs in, so loop iterations are unrolled on demand and an
//! untaken Switch branch never registers anything.
//!
//! ## Run order
//!
//! 1. Validate the request and build the subgraph
//! 2. Seed leaves and source ops off the root step
//! 3. Dispatch ready steps until every required value exists in the outer
//!    frame, preferring the frame of the previous step
//! 4. Collect outputs, release whatever the run no longer needs

use super::control_flow::{self, Branch, StepEdge};
use super::resolve::Resolver;
use super::{SessionState, Subgraph, ValueStore};
use crate::config::SessionConfig;
use crate::lifecycle::{ArrayLifecycleTracker, Dep};
use crate::listener::{ListenerId, Listeners, SessionListener};
use crate::report::{ExecutedStep, RunReport, RunStats};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use strand_core::dependency::{DependencyTracker, Edge};
use strand_core::error::{Result, StrandError};
use strand_core::graph::{Graph, OpNode, OpType, Variable, VariableKind};
use strand_core::traits::{MemoryManager, OpContext, OpExecutor};
use strand_core::types::{
    ArrayId, ExecKind, ExecStep, FrameArena, FrameIter, FrameIterId, NameId, VarId,
};
use strand_core::value::Value;
use tracing::instrument;

/// Names a run must produce.
#[derive(Debug, Default)]
struct Request {
    /// Requested names as given, with the variable holding their value.
    outputs: Vec<(String, NameId)>,
    /// Canonical requested variables.
    requested: HashSet<NameId>,
    /// Canonical requested and extra required variables, in request order.
    required: Vec<NameId>,
    /// Required variables with no value in the outer frame yet.
    pending: HashSet<NameId>,
}

/// Runs requests against one graph.
///
/// A session owns all per-run state: the step tracker, frames, stored values
/// and array obligations. It is reused across runs; a finished run is
/// cleared by the next one, a failed run must be cleared explicitly.
///
/// # Example
///
/// ```ignore
/// let mut session = Session::new(graph, Arc::new(KernelRegistry::with_defaults()), memory);
/// let outputs = session.run(&["out"], feeds, &[])?;
/// ```
pub struct Session {
    graph: Arc<Graph>,
    executor: Arc<dyn OpExecutor>,
    memory: Arc<dyn MemoryManager>,
    config: SessionConfig,
    listeners: Listeners,
    state: SessionState,
    tracker: DependencyTracker<ExecStep, ExecStep>,
    frames: FrameArena,
    store: ValueStore,
    lifecycle: ArrayLifecycleTracker,
    subgraph: Subgraph,
    feeds: HashMap<NameId, Value>,
    request: Request,
    log: Vec<ExecutedStep>,
    stats: RunStats,
    last_report: Option<RunReport>,
}

impl Session {
    /// Create a session with default configuration.
    pub fn new(
        graph: Arc<Graph>,
        executor: Arc<dyn OpExecutor>,
        memory: Arc<dyn MemoryManager>,
    ) -> Self {
        Self {
            graph,
            executor,
            memory,
            config: SessionConfig::default(),
            listeners: Listeners::default(),
            state: SessionState::Cleared,
            tracker: DependencyTracker::new("step tracker"),
            frames: FrameArena::new(),
            store: ValueStore::new(),
            lifecycle: ArrayLifecycleTracker::new(),
            subgraph: Subgraph::default(),
            feeds: HashMap::new(),
            request: Request::default(),
            log: Vec::new(),
            stats: RunStats::default(),
            last_report: None,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The graph this session runs.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Register a listener for execution events.
    pub fn add_listener(&mut self, listener: Arc<dyn SessionListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Steps executed by the current or last run, in dispatch order.
    ///
    /// Empty when [`SessionConfig::record_execution`] is off.
    pub fn execution_log(&self) -> &[ExecutedStep] {
        &self.log
    }

    /// Report of the last finished or failed run.
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Whether the step `(kind, name, frame)` was satisfied in the current
    /// or last run.
    ///
    /// For an op the frame is the one its outputs were written to. Switch
    /// branches are queried with [`ExecKind::SwitchLeft`] and
    /// [`ExecKind::SwitchRight`].
    pub fn is_satisfied(&self, kind: ExecKind, name: &str, frame: &FrameIter) -> bool {
        let Some(name) = self.graph.lookup(name) else {
            return false;
        };
        let Some(frame) = self.frames.find(frame, self.graph.names()) else {
            return false;
        };
        self.tracker.is_satisfied(&ExecStep::new(kind, name, frame))
    }

    /// Run the graph until every requested output and every extra required
    /// variable has a value in the outer frame.
    ///
    /// Returns exactly one value per requested name. Extra required
    /// variables that cannot be produced are logged and listed in the run
    /// report; requested outputs that cannot be produced fail the run with
    /// an [`ExecutionStall`](StrandError::ExecutionStall).
    ///
    /// # Errors
    ///
    /// Validation errors leave the session cleared. Any later error leaves
    /// it failed until [`clear`](Self::clear) is called.
    #[instrument(
        skip_all,
        fields(
            requested = requested.len(),
            feeds = placeholders.len(),
            extra_required = extra_required.len(),
        )
    )]
    pub fn run(
        &mut self,
        requested: &[&str],
        placeholders: HashMap<String, Value>,
        extra_required: &[&str],
    ) -> Result<HashMap<String, Value>> {
        match self.state {
            SessionState::Cleared => {}
            SessionState::Done => self.clear(),
            other => {
                return Err(StrandError::InvalidState {
                    expected: "cleared or done",
                    actual: other.to_string(),
                });
            }
        }

        self.validate(requested, placeholders, extra_required)?;
        self.transition(SessionState::SubgraphBuilt);
        tracing::debug!(
            ops = self.subgraph.op_count(),
            variables = self.subgraph.variable_count(),
            "subgraph built"
        );

        match self.execute() {
            Ok(outputs) => Ok(outputs),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Drop the obligation that keeps a returned output alive, releasing its
    /// arrays if nothing else holds them.
    ///
    /// Returns the number of arrays released.
    pub fn release_output(&mut self, name: &str) -> Result<usize> {
        if self.state != SessionState::Done {
            return Err(StrandError::InvalidState {
                expected: "done",
                actual: self.state.to_string(),
            });
        }
        let canonical = self
            .request
            .outputs
            .iter()
            .find(|(requested, _)| requested == name)
            .map(|&(_, canonical)| canonical)
            .ok_or_else(|| StrandError::UnknownOutput {
                name: name.to_string(),
            })?;

        let mut released = 0;
        for id in self.lifecycle.release_requested(canonical) {
            if self.release(id)? {
                released += 1;
            }
        }
        tracing::debug!(output = name, released, "output released");
        Ok(released)
    }

    /// Drop all per-run state.
    ///
    /// After a failed run, arrays the run produced and never released are
    /// returned to the memory manager first.
    pub fn clear(&mut self) {
        if self.state == SessionState::Failed {
            for id in self.lifecycle.abandoned() {
                if let Err(err) = self.lifecycle.release(id, self.memory.as_ref(), &mut self.store) {
                    tracing::warn!(array = %id, error = %err, "Failed to release array of a failed run");
                }
            }
        }

        self.tracker.clear();
        self.frames.clear();
        self.store.clear();
        self.lifecycle.clear();
        self.subgraph.clear();
        self.feeds.clear();
        self.request = Request::default();
        self.log.clear();
        self.stats = RunStats::default();
        self.transition(SessionState::Cleared);
    }

    fn validate(
        &mut self,
        requested: &[&str],
        placeholders: HashMap<String, Value>,
        extra_required: &[&str],
    ) -> Result<()> {
        if requested.is_empty() {
            return Err(StrandError::EmptyRequest);
        }
        let graph = Arc::clone(&self.graph);

        let mut request = Request::default();
        for &name in requested {
            let canonical = output_variable(&graph, name)?;
            request.outputs.push((name.to_string(), canonical));
            request.requested.insert(canonical);
            if !request.required.contains(&canonical) {
                request.required.push(canonical);
            }
        }
        for &name in extra_required {
            let canonical = output_variable(&graph, name)?;
            if !request.required.contains(&canonical) {
                request.required.push(canonical);
            }
        }

        let mut feeds = HashMap::with_capacity(placeholders.len());
        for (name, value) in placeholders {
            match graph.variable_named(&name) {
                Some(var) if var.kind == VariableKind::Placeholder => {
                    feeds.insert(var.name, value);
                }
                _ => return Err(StrandError::UnknownPlaceholder { name }),
            }
        }

        let subgraph = Subgraph::build(&graph, &request.required)?;
        for leaf in subgraph.leaves(&graph) {
            if leaf.kind != VariableKind::Placeholder || feeds.contains_key(&leaf.name) {
                continue;
            }
            let needed = request.requested.contains(&leaf.name)
                || !subgraph.readers(&graph, leaf.name).is_empty()
                || !subgraph.control_readers(&graph, leaf.name).is_empty();
            if needed {
                return Err(StrandError::MissingPlaceholder {
                    name: graph.name(leaf.name).to_string(),
                });
            }
        }

        request.pending = request.required.iter().copied().collect();
        self.request = request;
        self.feeds = feeds;
        self.subgraph = subgraph;
        Ok(())
    }

    fn execute(&mut self) -> Result<HashMap<String, Value>> {
        self.seed();
        self.transition(SessionState::Running);
        self.drive()?;

        let outputs = self.collect_outputs()?;
        self.finish(&outputs)?;
        self.transition(SessionState::Done);

        let report = self.report();
        tracing::info!(
            outputs = outputs.len(),
            steps = report.stats.steps_dispatched,
            ops = report.stats.ops_executed,
            max_iteration = report.stats.max_iteration,
            released = report.stats.arrays_released,
            "Run completed"
        );
        self.last_report = Some(report);
        Ok(outputs)
    }

    fn fail(&mut self, err: &StrandError) {
        tracing::error!(code = err.code(), error = %err, step = self.stats.steps_dispatched, "Run failed");
        self.transition(SessionState::Failed);
        self.last_report = Some(self.report());
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    fn report(&mut self) -> RunReport {
        self.stats.frames_created = self.frames.len();
        self.stats.max_iteration = self.frames.max_iteration();
        self.stats.arrays_released = self.lifecycle.released_count();
        RunReport {
            state: self.state,
            outputs: self.request.outputs.iter().map(|(name, _)| name.clone()).collect(),
            missing_optional: self
                .request
                .required
                .iter()
                .filter(|&&n| self.request.pending.contains(&n) && !self.request.requested.contains(&n))
                .map(|&n| self.graph.name(n).to_string())
                .collect(),
            stats: self.stats,
        }
    }

    /// Hang every leaf with a value and every source op off the root step.
    fn seed(&mut self) {
        let graph = Arc::clone(&self.graph);
        let outer = self.frames.outer();

        for leaf in self.subgraph.leaves(&graph) {
            let kind = match leaf.kind {
                VariableKind::Placeholder if self.feeds.contains_key(&leaf.name) => {
                    ExecKind::Placeholder
                }
                VariableKind::Constant => ExecKind::Constant,
                VariableKind::Variable => ExecKind::Variable,
                _ => continue,
            };
            let edges = std::iter::once(StepEdge::Root).chain(
                leaf.control_deps
                    .iter()
                    .map(|&op| StepEdge::Control(ExecStep::op(op, outer))),
            );
            self.tracker
                .add_edges(ExecStep::new(kind, leaf.name, outer), edges.map(Edge::from));
        }
        for op in self.subgraph.sources(&graph) {
            self.tracker
                .add_edges(ExecStep::op(op.name, outer), [Edge::from(StepEdge::Root)]);
        }

        self.tracker.mark_satisfied(ExecStep::root(), true);
        self.transition(SessionState::Seeded);
        tracing::debug!(ready = self.tracker.ready_len(), "seeded");
    }

    fn drive(&mut self) -> Result<()> {
        let mut current = self.frames.outer();
        while !self.request.pending.is_empty() {
            let Some(step) = self.next_ready(current)? else {
                return self.stalled();
            };
            current = self.dispatch(step)?;
        }
        Ok(())
    }

    fn next_ready(&mut self, current: FrameIterId) -> Result<Option<ExecStep>> {
        if !self.tracker.has_new_all_satisfied() {
            return Ok(None);
        }
        if self.config.prefer_current_frame {
            if let Some(step) = self
                .tracker
                .get_first_new_all_satisfied_matching(|s| s.frame == current)?
            {
                return Ok(Some(step));
            }
        }
        self.tracker.get_new_all_satisfied().map(Some)
    }

    fn stalled(&self) -> Result<()> {
        let missing: Vec<NameId> = self
            .request
            .required
            .iter()
            .copied()
            .filter(|n| self.request.pending.contains(n))
            .collect();
        let (outputs, optional): (Vec<NameId>, Vec<NameId>) = missing
            .iter()
            .copied()
            .partition(|n| self.request.requested.contains(n));

        if outputs.is_empty() {
            let names: Vec<&str> = optional.iter().map(|&n| self.graph.name(n)).collect();
            tracing::warn!(
                step = self.stats.steps_dispatched,
                missing = ?names,
                "Extra required variables were not produced"
            );
            return Ok(());
        }

        let limit = self.config.max_reported_missing;
        Err(StrandError::ExecutionStall {
            step: self.stats.steps_dispatched,
            missing_outputs: outputs.len(),
            missing_required: missing.len(),
            missing: outputs
                .iter()
                .chain(&optional)
                .take(limit)
                .map(|&n| self.graph.name(n).to_string())
                .collect(),
            truncated: missing.len() > limit,
        })
    }

    /// Execute one step. Returns the frame its values were written to.
    fn dispatch(&mut self, step: ExecStep) -> Result<FrameIterId> {
        self.stats.steps_dispatched += 1;
        match step.kind {
            ExecKind::Op => self.dispatch_op(step),
            ExecKind::Placeholder | ExecKind::Constant | ExecKind::Variable => {
                self.dispatch_leaf(step)?;
                Ok(step.frame)
            }
            ExecKind::Root | ExecKind::SwitchLeft | ExecKind::SwitchRight => {
                Err(StrandError::UnexpectedStep {
                    kind: step.kind.to_string(),
                    name: self.graph.name(step.name).to_string(),
                })
            }
        }
    }

    fn dispatch_leaf(&mut self, step: ExecStep) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let var = graph.require_variable(step.name)?;
        let name = graph.name(step.name);

        let (value, holder) = match step.kind {
            ExecKind::Placeholder => {
                let value = self.feeds.get(&step.name).cloned().ok_or_else(|| {
                    StrandError::MissingPlaceholder {
                        name: name.to_string(),
                    }
                })?;
                (value, Dep::PlaceholderHolder(step.name))
            }
            ExecKind::Constant => (stored_value(var, name)?, Dep::ConstantHolder(step.name)),
            _ => (stored_value(var, name)?, Dep::VariableHolder(step.name)),
        };
        tracing::trace!(kind = %step.kind, name, arrays = value.arrays().len(), "leaf available");

        let key = VarId::new(step.name, step.frame);
        self.lifecycle.track_leaf(key, &value, holder);
        self.record(&graph, step);
        self.tracker.mark_satisfied(step, true);
        self.publish(key, value)?;
        self.update_descendant_deps(&graph, step.name, step.frame)
    }

    fn dispatch_op(&mut self, step: ExecStep) -> Result<FrameIterId> {
        let graph = Arc::clone(&self.graph);
        let op = graph.require_op(step.name)?;
        let op_name = graph.name(op.name);

        let (input_frame, output_frame) = {
            let mut resolver = Resolver::new(&graph, &mut self.frames);
            (
                resolver.input_frame(op, step.frame)?,
                resolver.output_frame(op, step.frame)?,
            )
        };

        let frame = self.frames.to_frame_iter(step.frame, graph.names());
        let _span = crate::op_span!(op_name, op.op_type.label(), frame, frame.iteration).entered();
        self.listeners.each(|l| l.pre_op_execution(op_name, &frame));

        let produced = match &op.op_type {
            OpType::Ordinary { kernel } => {
                self.execute_kernel(&graph, op, kernel, &frame, input_frame)?
            }
            _ => self.execute_control_flow(&graph, op, step, input_frame)?,
        };
        self.stats.ops_executed += 1;
        tracing::debug!(outputs = produced.len(), "op executed");

        self.complete_op(&graph, op, step, output_frame, produced)?;
        Ok(output_frame)
    }

    fn execute_kernel(
        &mut self,
        graph: &Graph,
        op: &OpNode,
        kernel: &str,
        frame: &FrameIter,
        input_frame: FrameIterId,
    ) -> Result<Vec<(NameId, Value)>> {
        let mut inputs = Vec::with_capacity(op.inputs.len());
        for &input in &op.inputs {
            inputs.push(self.input_value(graph, op, input, input_frame)?);
        }

        let ctx = OpContext {
            op: graph.name(op.name),
            kernel,
            frame: &frame.frame,
            iteration: frame.iteration,
            memory: self.memory.as_ref(),
        };
        let outputs = self.executor.execute(&ctx, &inputs)?;
        if outputs.len() != op.outputs.len() {
            return Err(StrandError::OpArity {
                op: graph.name(op.name).to_string(),
                what: "outputs",
                expected: op.outputs.len(),
                actual: outputs.len(),
            });
        }
        Ok(op.outputs.iter().copied().zip(outputs).collect())
    }

    fn execute_control_flow(
        &mut self,
        graph: &Graph,
        op: &OpNode,
        step: ExecStep,
        input_frame: FrameIterId,
    ) -> Result<Vec<(NameId, Value)>> {
        self.stats.control_flow_ops += 1;
        let op_name = graph.name(op.name);

        match op.op_type {
            OpType::Merge => {
                let first = self.lookup(graph, input_at(graph, op, 0)?, input_frame)?;
                let second = self.lookup(graph, input_at(graph, op, 1)?, input_frame)?;
                let frame = self.frames.to_frame_iter(input_frame, graph.names()).to_string();
                let value = control_flow::merge(op_name, &frame, first.as_ref(), second.as_ref())?;
                Ok(vec![(output_at(graph, op, 0)?, value)])
            }
            OpType::Switch => {
                let data = self.input_value(graph, op, input_at(graph, op, 0)?, input_frame)?;
                let predicate = self.input_value(graph, op, input_at(graph, op, 1)?, input_frame)?;
                let branch = control_flow::switch_branch(op_name, &predicate)?;
                let kind = match branch {
                    Branch::Left => ExecKind::SwitchLeft,
                    Branch::Right => ExecKind::SwitchRight,
                };
                self.tracker
                    .mark_satisfied(ExecStep::new(kind, op.name, step.frame), true);
                tracing::debug!(branch = ?branch, "switch routed");
                Ok(vec![(output_at(graph, op, branch.index())?, data)])
            }
            OpType::LoopCond => {
                let condition = self.input_value(graph, op, input_at(graph, op, 0)?, input_frame)?;
                let value = control_flow::loop_cond(op_name, &condition)?;
                Ok(vec![(output_at(graph, op, 0)?, value)])
            }
            OpType::Enter { .. } | OpType::Exit | OpType::NextIteration => {
                let input = input_at(graph, op, 0)?;
                let value = self.lookup(graph, input, input_frame)?;
                let frame = self.frames.to_frame_iter(input_frame, graph.names()).to_string();
                let value = control_flow::forward(op_name, graph.name(input), &frame, value.as_ref())?;
                Ok(vec![(output_at(graph, op, 0)?, value)])
            }
            OpType::Ordinary { .. } => Err(StrandError::InvalidTopology {
                cause: format!("{op_name} is not a control-flow op"),
            }),
        }
    }

    /// Store the outputs of an executed op, settle array obligations and
    /// register the steps of its consumers.
    fn complete_op(
        &mut self,
        graph: &Graph,
        op: &OpNode,
        step: ExecStep,
        output_frame: FrameIterId,
        produced: Vec<(NameId, Value)>,
    ) -> Result<()> {
        let mut outputs = Vec::with_capacity(produced.len());
        for (name, value) in produced {
            let deps = self.output_deps(graph, name, output_frame)?;
            outputs.push((VarId::new(name, output_frame), value, deps));
        }
        let unused = self.lifecycle.track_outputs(
            outputs
                .iter()
                .map(|(key, value, deps)| (*key, value, deps.clone())),
            self.config.release_unused_outputs,
        );

        self.tracker
            .mark_satisfied(ExecStep::op(op.name, output_frame), true);
        self.record(graph, step);
        if !self.listeners.is_empty() {
            let frame = self.frames.to_frame_iter(step.frame, graph.names());
            let values: Vec<Value> = outputs.iter().map(|(_, value, _)| value.clone()).collect();
            let name = graph.name(op.name);
            self.listeners.each(|l| l.op_execution(name, &frame, &values));
        }

        let own: Vec<VarId> = outputs.iter().map(|(key, _, _)| *key).collect();
        for (key, value, _) in outputs {
            self.publish(key, value)?;
        }
        for id in unused {
            self.release(id)?;
        }
        for id in self
            .lifecycle
            .op_finished(op.name, output_frame, &own, op.is_switch())?
        {
            self.release(id)?;
        }

        for key in own {
            self.update_descendant_deps(graph, key.name, key.frame)?;
        }
        Ok(())
    }

    /// Obligations of a value of `variable` written to `frame`: one per
    /// consumer in the subgraph, plus the caller's claim on a requested
    /// output.
    fn output_deps(
        &mut self,
        graph: &Graph,
        variable: NameId,
        frame: FrameIterId,
    ) -> Result<Vec<Dep>> {
        let mut deps = Vec::new();
        for consumer in self.subgraph.readers(graph, variable) {
            let op = graph.require_op(consumer)?;
            if op.is_constant_enter() {
                deps.push(Dep::EndOfRun);
                continue;
            }
            let mut resolver = Resolver::new(graph, &mut self.frames);
            let scheduled = resolver.consumer_frame(op, frame);
            match resolver.output_frame(op, scheduled) {
                Ok(out) => deps.push(Dep::OpConsumer {
                    op: consumer,
                    frame: out,
                }),
                // An Exit read in the outer frame never runs.
                Err(StrandError::MissingParentFrame { .. }) => deps.push(Dep::EndOfRun),
                Err(err) => return Err(err),
            }
        }
        if frame == self.frames.outer() && self.request.requested.contains(&variable) {
            deps.push(Dep::RequestedOutput(variable));
        }
        Ok(deps)
    }

    /// Register the op steps that read `variable` in `frame`.
    fn update_descendant_deps(
        &mut self,
        graph: &Graph,
        variable: NameId,
        frame: FrameIterId,
    ) -> Result<()> {
        let mut consumers = self.subgraph.readers(graph, variable);
        for op in self.subgraph.control_readers(graph, variable) {
            if !consumers.contains(&op) {
                consumers.push(op);
            }
        }

        for consumer in consumers {
            let op = graph.require_op(consumer)?;
            let scheduled = Resolver::new(graph, &mut self.frames).consumer_frame(op, frame);
            self.add_dependencies_for_op(graph, op, scheduled)?;
        }
        Ok(())
    }

    /// Register every edge of `op` scheduled in `frame`, once.
    fn add_dependencies_for_op(
        &mut self,
        graph: &Graph,
        op: &OpNode,
        frame: FrameIterId,
    ) -> Result<()> {
        let step = ExecStep::op(op.name, frame);
        if self.tracker.has_dependency(&step) {
            return Ok(());
        }

        let mut resolver = Resolver::new(graph, &mut self.frames);
        let input_frame = resolver.input_frame(op, frame)?;
        let mut edges = Vec::with_capacity(op.inputs.len() + op.control_deps.len());
        if matches!(op.op_type, OpType::Merge) {
            let first = resolver.resolve(input_at(graph, op, 0)?, input_frame)?;
            let second = resolver.resolve(input_at(graph, op, 1)?, input_frame)?;
            edges.push(StepEdge::Either(first.step, second.step));
        } else {
            for &input in &op.inputs {
                edges.push(StepEdge::Input(resolver.resolve(input, input_frame)?.step));
            }
        }
        for &dep in &op.control_deps {
            edges.push(StepEdge::Control(resolver.resolve(dep, input_frame)?.step));
        }

        tracing::trace!(op = graph.name(op.name), frame = %frame, edges = edges.len(), "op step registered");
        self.tracker.add_edges(step, edges.into_iter().map(Edge::from));
        Ok(())
    }

    /// Store a value and notify listeners.
    fn publish(&mut self, key: VarId, value: Value) -> Result<()> {
        if !self.listeners.is_empty() {
            let frame = self.frames.to_frame_iter(key.frame, self.graph.names());
            let name = self.graph.name(key.name);
            self.listeners
                .each(|l| l.activation_available(name, &frame, &value));
        }
        self.store.put(key, value, &self.graph, &self.frames)?;
        if key.frame == self.frames.outer() {
            self.request.pending.remove(&key.name);
        }
        Ok(())
    }

    fn lookup(
        &mut self,
        graph: &Graph,
        variable: NameId,
        frame: FrameIterId,
    ) -> Result<Option<Value>> {
        let resolved = Resolver::new(graph, &mut self.frames).resolve(variable, frame)?;
        Ok(self.store.get(&resolved.var).cloned())
    }

    fn input_value(
        &mut self,
        graph: &Graph,
        op: &OpNode,
        variable: NameId,
        frame: FrameIterId,
    ) -> Result<Value> {
        self.lookup(graph, variable, frame)?
            .ok_or_else(|| StrandError::MissingFrameValue {
                op: graph.name(op.name).to_string(),
                variable: graph.name(variable).to_string(),
                frame: self.frames.to_frame_iter(frame, graph.names()).to_string(),
            })
    }

    fn record(&mut self, graph: &Graph, step: ExecStep) {
        if !self.config.record_execution {
            return;
        }
        self.log.push(ExecutedStep {
            kind: step.kind,
            name: graph.name(step.name).to_string(),
            frame: self.frames.to_frame_iter(step.frame, graph.names()),
        });
    }

    fn release(&mut self, id: ArrayId) -> Result<bool> {
        self.lifecycle
            .release(id, self.memory.as_ref(), &mut self.store)
    }

    fn collect_outputs(&self) -> Result<HashMap<String, Value>> {
        let mut outputs = HashMap::with_capacity(self.request.outputs.len());
        for (name, canonical) in &self.request.outputs {
            let value = self
                .store
                .get(&VarId::outer(*canonical))
                .cloned()
                .ok_or_else(|| StrandError::MissingFrameValue {
                    op: "run".to_string(),
                    variable: name.clone(),
                    frame: FrameIter::outer().to_string(),
                })?;
            outputs.insert(name.clone(), value);
        }
        Ok(outputs)
    }

    /// Release everything the finished run no longer needs, except the
    /// arrays handed back to the caller.
    fn finish(&mut self, outputs: &HashMap<String, Value>) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let returned: HashSet<ArrayId> = outputs
            .values()
            .flat_map(|v| v.arrays().iter().map(|t| t.id()))
            .collect();

        let mut unexecuted = Vec::new();
        if self.tracker.has_new_all_satisfied() {
            for step in self.tracker.get_new_all_satisfied_list()? {
                if step.kind != ExecKind::Op {
                    continue;
                }
                let Some(op) = graph.op(step.name) else {
                    continue;
                };
                if let Ok(frame) = Resolver::new(&graph, &mut self.frames).output_frame(op, step.frame) {
                    unexecuted.push((op.name, frame));
                }
            }
        }

        self.stats.arrays_deferred = self.lifecycle.deferred_count();
        let ids = self.lifecycle.end_run(&unexecuted, &returned)?;
        tracing::debug!(unexecuted = unexecuted.len(), releasing = ids.len(), "end of run");
        for id in ids {
            self.release(id)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .field("steps_dispatched", &self.stats.steps_dispatched)
            .finish_non_exhaustive()
    }
}

fn output_variable(graph: &Graph, name: &str) -> Result<NameId> {
    let id = graph
        .lookup(name)
        .filter(|&id| graph.variable(id).is_some())
        .ok_or_else(|| StrandError::UnknownOutput {
            name: name.to_string(),
        })?;
    Ok(graph.canonical_variable(id)?.name)
}

fn stored_value(var: &Variable, name: &str) -> Result<Value> {
    var.value.clone().ok_or_else(|| StrandError::InvalidTopology {
        cause: format!("{name} has no stored value"),
    })
}

fn input_at(graph: &Graph, op: &OpNode, index: usize) -> Result<NameId> {
    op.inputs
        .get(index)
        .copied()
        .ok_or_else(|| StrandError::OpArity {
            op: graph.name(op.name).to_string(),
            what: "inputs",
            expected: index + 1,
            actual: op.inputs.len(),
        })
}

fn output_at(graph: &Graph, op: &OpNode, index: usize) -> Result<NameId> {
    op.outputs
        .get(index)
        .copied()
        .ok_or_else(|| StrandError::OpArity {
            op: graph.name(op.name).to_string(),
            what: "outputs",
            expected: index + 1,
            actual: op.outputs.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::testing::MockMemoryManager;
    use strand_ops::KernelRegistry;

    fn session(graph: Graph) -> (Session, Arc<MockMemoryManager>) {
        let memory = Arc::new(MockMemoryManager::new());
        let session = Session::new(
            Arc::new(graph),
            Arc::new(KernelRegistry::with_defaults()),
            memory.clone(),
        );
        (session, memory)
    }

    fn feeds(pairs: &[(&str, f64)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|&(name, v)| (name.to_string(), Value::scalar(v)))
            .collect()
    }

    fn conditional() -> Graph {
        Graph::builder()
            .placeholder("x")
            .placeholder("flag")
            .switch("switch", "x", "flag", ["x_false", "x_true"])
            .op("negate", "neg", &["x_false"], &["neg_out"])
            .op("double", "add", &["x_true", "x_true"], &["double_out"])
            .merge("merge", ["neg_out", "double_out"], "out")
            .build()
            .unwrap()
    }

    #[test]
    fn acyclic_run_returns_requested_outputs() {
        let graph = Graph::builder()
            .placeholder("a")
            .constant("b", Value::scalar(2.0))
            .op("sum", "add", &["a", "b"], &["c"])
            .op("product", "mul", &["c", "b"], &["d"])
            .build()
            .unwrap();
        let (mut session, _) = session(graph);

        let out = session.run(&["d"], feeds(&[("a", 3.0)]), &[]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["d"].as_scalar(), Some(10.0));
        assert_eq!(session.state(), SessionState::Done);

        let report = session.last_report().unwrap();
        assert_eq!(report.stats.ops_executed, 2);
        assert_eq!(report.stats.control_flow_ops, 0);
        assert!(report.is_complete());
    }

    #[test]
    fn done_session_clears_on_next_run() {
        let graph = Graph::builder()
            .placeholder("a")
            .op("negate", "neg", &["a"], &["b"])
            .build()
            .unwrap();
        let (mut session, _) = session(graph);

        let first = session.run(&["b"], feeds(&[("a", 1.0)]), &[]).unwrap();
        let second = session.run(&["b"], feeds(&[("a", 4.0)]), &[]).unwrap();
        assert_eq!(first["b"].as_scalar(), Some(-1.0));
        assert_eq!(second["b"].as_scalar(), Some(-4.0));
        assert_eq!(session.execution_log().len(), 2);
    }

    #[test]
    fn switch_takes_exactly_one_branch() {
        let (mut session, _) = session(conditional());
        let mut input = feeds(&[("x", 3.0)]);
        input.insert("flag".to_string(), Value::bool(true));

        let out = session.run(&["out"], input, &[]).unwrap();
        assert_eq!(out["out"].as_scalar(), Some(6.0));

        let outer = FrameIter::outer();
        assert!(session.is_satisfied(ExecKind::SwitchRight, "switch", &outer));
        assert!(!session.is_satisfied(ExecKind::SwitchLeft, "switch", &outer));
        assert!(session.is_satisfied(ExecKind::Op, "double", &outer));
        assert!(!session.is_satisfied(ExecKind::Op, "negate", &outer));
        assert!(!session.is_satisfied(ExecKind::Op, "missing", &outer));
    }

    #[test]
    fn failed_run_must_be_cleared() {
        let graph = Graph::builder()
            .placeholder("a")
            .op("mystery", "no_such_kernel", &["a"], &["b"])
            .build()
            .unwrap();
        let (mut session, _) = session(graph);

        let err = session.run(&["b"], feeds(&[("a", 1.0)]), &[]).unwrap_err();
        assert_eq!(err.code(), "E402");
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.last_report().unwrap().state, SessionState::Failed);

        let err = session.run(&["b"], feeds(&[("a", 1.0)]), &[]).unwrap_err();
        assert_eq!(err.code(), "E901");

        session.clear();
        assert_eq!(session.state(), SessionState::Cleared);
    }

    #[test]
    fn validation_errors_leave_session_cleared() {
        let (mut session, _) = session(conditional());
        let err = session.run(&[], HashMap::new(), &[]).unwrap_err();
        assert_eq!(err.code(), "E101");
        assert_eq!(session.state(), SessionState::Cleared);

        let err = session.run(&["nope"], HashMap::new(), &[]).unwrap_err();
        assert_eq!(err.code(), "E102");
        assert_eq!(session.state(), SessionState::Cleared);
    }

    #[test]
    fn release_output_requires_done() {
        let graph = Graph::builder()
            .placeholder("a")
            .op("negate", "neg", &["a"], &["b"])
            .build()
            .unwrap();
        let (mut session, memory) = session(graph);

        assert_eq!(session.release_output("b").unwrap_err().code(), "E901");

        let out = session.run(&["b"], feeds(&[("a", 2.0)]), &[]).unwrap();
        let id = out["b"].arrays()[0].id();
        assert!(!memory.was_released(id));

        assert_eq!(session.release_output("b").unwrap(), 1);
        assert!(memory.was_released(id));
        assert_eq!(session.release_output("b").unwrap(), 0);
        assert_eq!(session.release_output("a").unwrap_err().code(), "E102");
    }

    #[test]
    fn execution_log_can_be_disabled() {
        let graph = Graph::builder()
            .placeholder("a")
            .op("negate", "neg", &["a"], &["b"])
            .build()
            .unwrap();
        let (session, _) = session(graph);
        let mut session = session.with_config(SessionConfig::default().with_record_execution(false));

        session.run(&["b"], feeds(&[("a", 2.0)]), &[]).unwrap();
        assert!(session.execution_log().is_empty());
        assert!(!session.config().record_execution);
    }
}
