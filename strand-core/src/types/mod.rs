//! Core identifier and key types.

mod frame;
mod ids;
mod names;
mod step;

pub use frame::{Ancestors, FrameArena, FrameIter, FrameRecord, OUTER_FRAME};
pub use ids::{ArrayId, FrameIterId, NameId};
pub use names::NameTable;
pub use step::{ExecKind, ExecStep, VarId};
