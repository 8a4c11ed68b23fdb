//! Actions dispatched when a rule set matches.
//!
//! The action registry is process-global: populated with the standard
//! actions at first use, extendable at program startup via
//! [`register_action`]. Actions are looked up at dispatch time, not at
//! init, so a set may legitimately reference an action registered later.

mod registry;
mod standard;

pub use registry::{find_action, register_action};
pub use standard::{AllowAction, BlockAction, LogAction, RedirectAction, TagAction};

use crate::inspect::ResponseWriter;

/// A side-effecting response policy.
pub trait Action: Send + Sync {
    /// Registry name this action is dispatched under.
    fn name(&self) -> &str;

    /// Perform the action, writing any response through `writer`.
    ///
    /// Returns `go_next`: whether downstream handlers should still run.
    fn perform(&self, writer: &mut dyn ResponseWriter) -> bool;
}
