//! Run reports.

use crate::scheduler::SessionState;
use serde::Serialize;
use strand_core::types::{ExecKind, FrameIter};

/// Counters collected during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Steps taken from the ready queue.
    pub steps_dispatched: usize,
    /// Op instances executed, control flow included.
    pub ops_executed: usize,
    /// Op instances dispatched natively as control flow.
    pub control_flow_ops: usize,
    /// Distinct frame records created.
    pub frames_created: usize,
    /// Highest iteration reached in any frame.
    pub max_iteration: u32,
    /// Arrays returned to the memory manager.
    pub arrays_released: usize,
    /// Arrays whose release waited for the end of the run.
    pub arrays_deferred: usize,
}

/// One executed step, as recorded in the execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutedStep {
    /// Step kind.
    pub kind: ExecKind,
    /// Op or variable name.
    pub name: String,
    /// Frame and iteration the step ran in.
    pub frame: FrameIter,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Final session state.
    pub state: SessionState,
    /// Names returned to the caller.
    pub outputs: Vec<String>,
    /// Extra required variables that were never produced.
    pub missing_optional: Vec<String>,
    /// Counters.
    pub stats: RunStats,
}

impl RunReport {
    /// Whether every extra required variable was produced.
    pub fn is_complete(&self) -> bool {
        self.missing_optional.is_empty()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RunReport {{ state: {}, outputs: {}, missing_optional: {}, ops_executed: {}, arrays_released: {} }}",
            self.state,
            self.outputs.len(),
            self.missing_optional.len(),
            self.stats.ops_executed,
            self.stats.arrays_released
        )
    }
}
