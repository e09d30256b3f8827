//! Session state machine.

use serde::Serialize;
use std::fmt;

/// Lifecycle of a [`Session`](crate::Session).
///
/// ```text
/// Cleared -> SubgraphBuilt -> Seeded -> Running -> Done
///                                           \---> Failed
/// ```
///
/// A session in `Done` is cleared automatically by the next `run`. A session
/// in `Failed` refuses to run until [`clear`](crate::Session::clear) is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No run state held.
    #[default]
    Cleared,
    /// The subgraph for the current request is known.
    SubgraphBuilt,
    /// Leaves are registered and the root step is satisfied.
    Seeded,
    /// The dispatch loop is draining the ready queue.
    Running,
    /// The last run finished.
    Done,
    /// The last run failed.
    Failed,
}

impl SessionState {
    /// Whether a run may start from this state.
    #[must_use]
    pub fn can_run(self) -> bool {
        matches!(self, Self::Cleared | Self::Done)
    }

    /// Whether a run has ended, successfully or not.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, Cleared) => true,
            (Cleared, SubgraphBuilt) => true,
            (SubgraphBuilt, Seeded) => true,
            (Seeded, Running) => true,
            (Running, Done) => true,
            (SubgraphBuilt | Seeded | Running, Failed) => true,
            _ => false,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cleared => "cleared",
            Self::SubgraphBuilt => "subgraph_built",
            Self::Seeded => "seeded",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
