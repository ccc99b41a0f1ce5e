//! Downstream consumers of assembled launches.

use crate::launch::LaunchDescriptor;
use crate::types::{CallPhase, SpanId};

/// A launch seen at its entry (readable) or exit (consumed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEvent {
    /// Entry or exit of the launch call.
    pub phase: CallPhase,
    /// Kernel symbol name.
    pub symbol: String,
    /// The span opened for the launch call. `None` when the launch entry
    /// was past the nesting limit and no span was opened for it.
    pub span: Option<SpanId>,
    /// The assembled descriptor; `None` when the launch was not configured
    /// through the configure / bind protocol.
    pub descriptor: Option<LaunchDescriptor>,
}

impl LaunchEvent {
    /// Whether the launch went through configure / bind.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.descriptor.is_some()
    }
}

/// Receives launch events from a [`Dispatcher`](super::Dispatcher).
///
/// Called on the intercepting thread after the call context has been
/// released, so observers may re-enter the dispatcher.
pub trait LaunchObserver: Send + Sync {
    /// The launch call has been entered; the descriptor is complete.
    fn launch_entered(&self, _event: &LaunchEvent) {}

    /// The launch call has returned; the descriptor has been consumed.
    fn launch_completed(&self, _event: &LaunchEvent) {}
}
