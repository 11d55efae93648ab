//! Navigation gates: the protected-view route gate and its public-only inverse.

mod route_gate;
mod public_only;

pub use route_gate::{DenyReason, GateState, RouteGate, Settled, Ticket};
pub use public_only::PublicOnlyGate;

/// What the view layer should do for the current navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Show a neutral placeholder and nothing else.
    Loading,
    Render,
    /// Leave for this path, replacing the history entry.
    Redirect(String),
}
