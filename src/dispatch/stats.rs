//! Dispatch counters.
//!
//! All counters are monotone relaxed atomics, safe to read from any thread
//! while dispatch is running.

use super::DispatchReport;
use crate::error::EngineError;
use crate::types::CallPhase;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one dispatcher.
#[derive(Debug, Default)]
pub struct DispatchStats {
    records: AtomicU64,
    spans_opened: AtomicU64,
    spans_closed: AtomicU64,
    launches_completed: AtomicU64,
    protocol_violations: AtomicU64,
    stack_underflows: AtomicU64,
    depth_exceeded: AtomicU64,
    context_busy: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    /// Notifications processed.
    pub records: u64,
    /// Spans opened on entry.
    pub spans_opened: u64,
    /// Spans submitted on exit.
    pub spans_closed: u64,
    /// Launch exits observed.
    pub launches_completed: u64,
    /// Rejected configure / bind transitions.
    pub protocol_violations: u64,
    /// Exits with no open frame.
    pub stack_underflows: u64,
    /// Entries past the depth limit.
    pub depth_exceeded: u64,
    /// Reentrant notifications dropped.
    pub context_busy: u64,
}

impl DispatchStatsSnapshot {
    /// Sum of all engine-local errors.
    #[must_use]
    pub const fn errors(&self) -> u64 {
        self.protocol_violations + self.stack_underflows + self.depth_exceeded + self.context_busy
    }
}

impl DispatchStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, report: &DispatchReport) {
        self.records.fetch_add(1, Ordering::Relaxed);
        if report.opened.is_some() {
            self.spans_opened.fetch_add(1, Ordering::Relaxed);
        }
        if report.closed.is_some() {
            self.spans_closed.fetch_add(1, Ordering::Relaxed);
        }
        if report
            .launch
            .as_ref()
            .is_some_and(|event| event.phase == CallPhase::Exit)
        {
            self.launches_completed.fetch_add(1, Ordering::Relaxed);
        }
        for err in &report.errors {
            let counter = match err {
                EngineError::ProtocolViolation(_) => &self.protocol_violations,
                EngineError::StackUnderflow => &self.stack_underflows,
                EngineError::DepthExceeded { .. } => &self.depth_exceeded,
                EngineError::ContextBusy => &self.context_busy,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            records: self.records.load(Ordering::Relaxed),
            spans_opened: self.spans_opened.load(Ordering::Relaxed),
            spans_closed: self.spans_closed.load(Ordering::Relaxed),
            launches_completed: self.launches_completed.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            stack_underflows: self.stack_underflows.load(Ordering::Relaxed),
            depth_exceeded: self.depth_exceeded.load(Ordering::Relaxed),
            context_busy: self.context_busy.load(Ordering::Relaxed),
        }
    }
}
