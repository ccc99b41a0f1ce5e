//! Error types.
//!
//! [`EngineError`] covers the engine-local failures of a single intercepted
//! call. They are reported on the diagnostic channel and never propagate to
//! the monitored code. [`Error`] is the crate-level error for setup paths
//! (configuration, collector transport).

use thiserror::Error;

use crate::config::ConfigError;
use crate::sink::ExportError;

/// Caller misuse of the configure / bind / launch protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// A configure call arrived while a launch descriptor was already open.
    #[error("already configured")]
    AlreadyConfigured,
    /// An argument binding arrived with no open launch descriptor.
    #[error("argument bound before configuration")]
    ArgumentBeforeConfigure,
}

/// Engine-local failure for one intercepted call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The launch protocol was violated; the offending transition was rejected.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),
    /// An exit arrived with no open span.
    #[error("span stack underflow: exit with no matching entry")]
    StackUnderflow,
    /// An entry exceeded the configured nesting limit; no span was opened.
    #[error("span stack depth {depth} exceeds limit {limit}")]
    DepthExceeded {
        /// Depth the entry would have reached.
        depth: usize,
        /// Configured limit.
        limit: usize,
    },
    /// A notification arrived while this thread's call context was already
    /// borrowed by an outer dispatch; it was dropped.
    #[error("call context busy: reentrant dispatch dropped")]
    ContextBusy,
}

impl EngineError {
    /// Short stable name, used as a structured log field.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::StackUnderflow => "stack_underflow",
            Self::DepthExceeded { .. } => "depth_exceeded",
            Self::ContextBusy => "context_busy",
        }
    }
}

/// Crate-level error for setup and export paths.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Collector transport could not be created or used.
    #[error(transparent)]
    Export(#[from] ExportError),
    /// Engine-local failure surfaced to a caller that asked for it.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result alias for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;
