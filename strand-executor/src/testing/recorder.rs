//! Listener that records everything.

use crate::listener::SessionListener;
use parking_lot::Mutex;
use strand_core::types::FrameIter;
use strand_core::value::Value;

/// One recorded listener callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An op instance was about to run.
    PreOp {
        /// Op name.
        op: String,
        /// Frame the op ran in.
        frame: FrameIter,
    },
    /// An op instance ran.
    Op {
        /// Op name.
        op: String,
        /// Frame the op ran in.
        frame: FrameIter,
        /// Scalar view of each output, `None` for non-scalars.
        outputs: Vec<Option<f64>>,
    },
    /// A value became available.
    Activation {
        /// Variable name.
        variable: String,
        /// Frame the value was written to.
        frame: FrameIter,
    },
}

/// A [`SessionListener`] that keeps every callback in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Names of executed ops in execution order.
    pub fn ops(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Op { op, .. } => Some(op.clone()),
                _ => None,
            })
            .collect()
    }

    /// Frames `op` executed in, in execution order.
    pub fn executions_of(&self, op: &str) -> Vec<FrameIter> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Op { op: name, frame, .. } if name == op => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Iterations `op` executed at, in execution order.
    pub fn iterations_of(&self, op: &str) -> Vec<u32> {
        self.executions_of(op)
            .into_iter()
            .map(|f| f.iteration)
            .collect()
    }

    /// Scalar outputs of every execution of `op`.
    pub fn outputs_of(&self, op: &str) -> Vec<Vec<Option<f64>>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Op { op: name, outputs, .. } if name == op => Some(outputs.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether `op` executed at all.
    pub fn executed(&self, op: &str) -> bool {
        !self.executions_of(op).is_empty()
    }

    /// Frames a value of `variable` became available in.
    pub fn activations_of(&self, variable: &str) -> Vec<FrameIter> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Activation { variable: name, frame } if name == variable => {
                    Some(frame.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Number of `pre_op_execution` callbacks.
    pub fn pre_op_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Event::PreOp { .. }))
            .count()
    }

    /// Forget all events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SessionListener for RecordingListener {
    fn pre_op_execution(&self, op: &str, frame: &FrameIter) {
        self.events.lock().push(Event::PreOp {
            op: op.to_string(),
            frame: frame.clone(),
        });
    }

    fn op_execution(&self, op: &str, frame: &FrameIter, outputs: &[Value]) {
        self.events.lock().push(Event::Op {
            op: op.to_string(),
            frame: frame.clone(),
            outputs: outputs.iter().map(Value::as_scalar).collect(),
        });
    }

    fn activation_available(&self, variable: &str, frame: &FrameIter, _value: &Value) {
        self.events.lock().push(Event::Activation {
            variable: variable.to_string(),
            frame: frame.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let recorder = RecordingListener::new();
        let body = FrameIter::new("body", 2, Some(FrameIter::outer()));

        recorder.pre_op_execution("add", &body);
        recorder.op_execution("add", &body, &[Value::scalar(3.0)]);
        recorder.activation_available("sum", &body, &Value::scalar(3.0));
        recorder.op_execution("neg", &FrameIter::outer(), &[]);

        assert_eq!(recorder.ops(), vec!["add", "neg"]);
        assert_eq!(recorder.iterations_of("add"), vec![2]);
        assert_eq!(recorder.outputs_of("add"), vec![vec![Some(3.0)]]);
        assert_eq!(recorder.activations_of("sum"), vec![body]);
        assert_eq!(recorder.pre_op_count(), 1);
        assert!(!recorder.executed("mul"));

        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
