//! Mapping variable references to the steps and value keys behind them.

use strand_core::error::{Result, StrandError};
use strand_core::graph::{Graph, OpNode, OpType, VariableKind};
use strand_core::types::{ExecKind, ExecStep, FrameArena, FrameIterId, FrameRecord, NameId, VarId};

/// Where the value of a variable comes from in a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// Step whose satisfaction makes the value available.
    pub step: ExecStep,
    /// Key the value is stored under.
    pub var: VarId,
}

/// Resolves variable references and frame crossings.
pub struct Resolver<'a> {
    graph: &'a Graph,
    frames: &'a mut FrameArena,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `graph`, interning new frames into `frames`.
    pub fn new(graph: &'a Graph, frames: &'a mut FrameArena) -> Self {
        Self { graph, frames }
    }

    /// Resolve `variable` as read by an op running in `frame`.
    ///
    /// - Placeholders, constants and variables live in the outer frame.
    /// - Outputs of a Switch resolve to the branch step: output 0 to
    ///   `SwitchLeft`, output 1 to `SwitchRight`.
    /// - Outputs of a loop-invariant Enter resolve to iteration 0 of the
    ///   frame, with enclosing loop-invariant frames also at iteration 0.
    /// - Anything else resolves to the producing op in `frame`.
    pub fn resolve(&mut self, variable: NameId, frame: FrameIterId) -> Result<Resolved> {
        let var = self.graph.canonical_variable(variable)?;
        let name = var.name;

        let leaf_kind = match var.kind {
            VariableKind::Variable => Some(ExecKind::Variable),
            VariableKind::Constant => Some(ExecKind::Constant),
            VariableKind::Placeholder => Some(ExecKind::Placeholder),
            VariableKind::Computed => None,
        };
        if let Some(kind) = leaf_kind {
            let outer = self.frames.outer();
            return Ok(Resolved {
                step: ExecStep::new(kind, name, outer),
                var: VarId::new(name, outer),
            });
        }

        let producer = var.producer.ok_or_else(|| StrandError::NoProducer {
            variable: self.graph.name(name).to_string(),
        })?;
        let op = self.graph.require_op(producer)?;

        match op.op_type {
            OpType::Switch => {
                let kind = match op.output_index(name) {
                    Some(0) => ExecKind::SwitchLeft,
                    Some(1) => ExecKind::SwitchRight,
                    index => {
                        return Err(StrandError::InvalidSwitchOutput {
                            op: self.graph.name(op.name).to_string(),
                            variable: self.graph.name(name).to_string(),
                            index: index.unwrap_or(usize::MAX),
                        });
                    }
                };
                Ok(Resolved {
                    step: ExecStep::new(kind, op.name, frame),
                    var: VarId::new(name, frame),
                })
            }
            OpType::Enter { constant: true, .. } => {
                let frame = self.loop_invariant_frame(op, frame)?;
                Ok(Resolved {
                    step: ExecStep::op(op.name, frame),
                    var: VarId::new(name, frame),
                })
            }
            _ => Ok(Resolved {
                step: ExecStep::op(op.name, frame),
                var: VarId::new(name, frame),
            }),
        }
    }

    /// Frame a consumer of a value produced in `frame` is scheduled in.
    ///
    /// A NextIteration reading iteration `i` runs as iteration `i + 1`.
    pub fn consumer_frame(&mut self, consumer: &OpNode, frame: FrameIterId) -> FrameIterId {
        match consumer.op_type {
            OpType::NextIteration => self.frames.next_iteration(frame),
            _ => frame,
        }
    }

    /// Frame the inputs of an op scheduled in `step_frame` are read from.
    pub fn input_frame(&mut self, op: &OpNode, step_frame: FrameIterId) -> Result<FrameIterId> {
        match op.op_type {
            OpType::NextIteration => {
                self.frames
                    .previous_iteration(step_frame)
                    .ok_or_else(|| StrandError::InvalidTopology {
                        cause: format!(
                            "NextIteration {} scheduled at iteration 0",
                            self.graph.name(op.name)
                        ),
                    })
            }
            _ => Ok(step_frame),
        }
    }

    /// Frame an op scheduled in `step_frame` writes its outputs to.
    pub fn output_frame(&mut self, op: &OpNode, step_frame: FrameIterId) -> Result<FrameIterId> {
        match op.op_type {
            OpType::Enter { frame, .. } => Ok(self.frames.enter(step_frame, frame)),
            OpType::Exit => {
                self.frames
                    .parent(step_frame)
                    .ok_or_else(|| StrandError::MissingParentFrame {
                        op: self.graph.name(op.name).to_string(),
                        frame: self
                            .frames
                            .to_frame_iter(step_frame, self.graph.names())
                            .to_string(),
                    })
            }
            _ => Ok(step_frame),
        }
    }

    /// Iteration 0 of `frame`, walking up through chains of loop-invariant
    /// Enters so that every enclosing loop-invariant frame is at iteration 0
    /// as well.
    fn loop_invariant_frame(&mut self, op: &OpNode, frame: FrameIterId) -> Result<FrameIterId> {
        let mut chain = vec![frame];
        let mut current = op;
        let mut cursor = frame;
        loop {
            let Some(&input) = current.inputs.first() else {
                break;
            };
            let input = self.graph.canonical_variable(input)?;
            let Some(producer) = input.producer.and_then(|p| self.graph.op(p)) else {
                break;
            };
            if !producer.is_constant_enter() {
                break;
            }
            cursor = self
                .frames
                .parent(cursor)
                .ok_or_else(|| StrandError::MissingParentFrame {
                    op: self.graph.name(producer.name).to_string(),
                    frame: self
                        .frames
                        .to_frame_iter(cursor, self.graph.names())
                        .to_string(),
                })?;
            chain.push(cursor);
            current = producer;
        }

        let top = chain.last().copied().unwrap_or(frame);
        let mut rebuilt = self.frames.with_iteration(top, 0);
        for &inner in chain.iter().rev().skip(1) {
            let record = *self.frames.record(inner);
            rebuilt = self.frames.intern(FrameRecord {
                frame: record.frame,
                iteration: 0,
                parent: Some(rebuilt),
            });
        }
        Ok(rebuilt)
    }
}
