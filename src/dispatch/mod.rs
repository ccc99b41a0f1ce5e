//! Interception dispatcher.
//!
//! Receives raw enter/exit notifications and routes them to the span stack
//! and, for launch-protocol calls, to the assembler. For every call:
//!
//! - entry: push a span, then run kind-specific handling;
//! - exit: run kind-specific handling, then pop and submit the span.
//!
//! Calls with no kind-specific handling still get a span. Engine-local errors
//! are returned in the [`DispatchReport`], logged, and counted; they never
//! reach the monitored code.

pub mod context;
pub mod observer;
pub mod stats;

pub use context::CallContext;
pub use observer::{LaunchEvent, LaunchObserver};
pub use stats::{DispatchStats, DispatchStatsSnapshot};

use crate::error::EngineError;
use crate::launch::LaunchDescriptor;
use crate::tracer::Tracer;
use crate::types::{CallKind, CallParams, CallPhase, CallbackRecord, SpanId};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// How the call was routed.
    pub kind: CallKind,
    /// Span opened by this entry.
    pub opened: Option<SpanId>,
    /// Span submitted by this exit.
    pub closed: Option<SpanId>,
    /// Launch event produced by a launch entry or exit.
    pub launch: Option<LaunchEvent>,
    /// Engine-local errors, in the order they occurred.
    pub errors: SmallVec<[EngineError; 2]>,
}

impl DispatchReport {
    fn new(kind: CallKind) -> Self {
        Self {
            kind,
            opened: None,
            closed: None,
            launch: None,
            errors: SmallVec::new(),
        }
    }

    /// Whether the notification was handled without engine-local errors.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Routes intercepted calls for one tracer.
pub struct Dispatcher {
    owner: context::ContextOwner,
    tracer: Arc<Tracer>,
    observers: Vec<Arc<dyn LaunchObserver>>,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Creates a dispatcher over a shared tracer.
    #[must_use]
    pub fn new(tracer: Arc<Tracer>) -> Self {
        Self {
            owner: context::ContextOwner::new(NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed)),
            tracer,
            observers: Vec::new(),
            stats: DispatchStats::new(),
        }
    }

    /// Registers a launch observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn LaunchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The shared tracer.
    #[must_use]
    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    /// Dispatch counters.
    #[must_use]
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Creates a context sized for this dispatcher's tracer.
    #[must_use]
    pub fn new_context(&self) -> CallContext {
        CallContext::with_max_depth(self.tracer.max_stack_depth())
    }

    /// Handles one notification against the calling thread's context.
    ///
    /// This is the entry point for the callback subsystem. Errors are logged
    /// and counted; observers are notified after the context is released.
    pub fn dispatch(&self, record: &CallbackRecord) -> DispatchReport {
        let report = context::with_thread_context(&self.owner, &self.tracer, |ctx| {
            self.process(ctx, record)
        })
        .unwrap_or_else(|| {
            let mut report = DispatchReport::new(record.kind());
            report.errors.push(EngineError::ContextBusy);
            report
        });
        self.report(record, &report);
        report
    }

    /// Handles one notification against an explicit context.
    ///
    /// Pure state transition plus sink calls: no logging, counting, or
    /// observer notification.
    pub fn process(&self, ctx: &mut CallContext, record: &CallbackRecord) -> DispatchReport {
        let mut report = DispatchReport::new(record.kind());
        match record.phase {
            CallPhase::Enter => {
                match ctx.spans.on_call_enter(&self.tracer, record.span_name()) {
                    Ok(span) => {
                        let sink = self.tracer.sink();
                        sink.tag(span, "call.domain", record.domain.as_str());
                        sink.tag(span, "call.id", &record.call_id.to_string());
                        report.opened = Some(span);
                    }
                    Err(err) => report.errors.push(err),
                }
                self.handle_kind(ctx, record, &mut report);
            }
            CallPhase::Exit => {
                self.handle_kind(ctx, record, &mut report);
                match ctx.spans.on_call_exit(&self.tracer) {
                    Ok(closed) => report.closed = closed,
                    Err(err) => report.errors.push(err),
                }
            }
        }
        report
    }

    fn handle_kind(&self, ctx: &mut CallContext, record: &CallbackRecord, report: &mut DispatchReport) {
        let phase = record.phase;
        if report.kind == CallKind::Untracked {
            return;
        }
        match &record.params {
            CallParams::Configure {
                grid,
                block,
                shared_mem,
                stream,
            } => {
                if let Err(violation) =
                    ctx.assembler
                        .on_configure(phase, *grid, *block, *shared_mem, *stream)
                {
                    report.errors.push(violation.into());
                }
            }
            CallParams::SetupArgument { arg, .. } => {
                if let Err(violation) = ctx.assembler.on_bind_argument(phase, *arg) {
                    report.errors.push(violation.into());
                }
            }
            CallParams::Launch { symbol } => {
                let descriptor = ctx.assembler.on_launch(phase);
                if phase.is_enter() {
                    if let Some(span) = ctx.spans.top_span() {
                        self.tag_launch(span, symbol, descriptor.as_ref());
                    }
                }
                report.launch = Some(LaunchEvent {
                    phase,
                    symbol: symbol.clone(),
                    span: ctx.spans.top_span(),
                    descriptor,
                });
            }
            CallParams::Memcpy {
                dst,
                src,
                count,
                kind,
            } => {
                let Some(span) = ctx.spans.top_span() else {
                    return;
                };
                let sink = self.tracer.sink();
                if phase.is_enter() {
                    sink.tag(span, "memcpy.bytes", &count.to_string());
                    sink.tag(span, "memcpy.kind", kind.as_str());
                    sink.tag(span, "memcpy.src", &format!("{src:#x}"));
                    sink.tag(span, "memcpy.dst", &format!("{dst:#x}"));
                }
                if let Some(ns) = record.device_timestamp_ns {
                    let key = if phase.is_enter() {
                        "device.start_ns"
                    } else {
                        "device.end_ns"
                    };
                    sink.tag(span, key, &ns.to_string());
                }
            }
            CallParams::None => {}
        }
    }

    fn tag_launch(&self, span: SpanId, symbol: &str, descriptor: Option<&LaunchDescriptor>) {
        let sink = self.tracer.sink();
        sink.tag(span, "kernel.symbol", symbol);
        sink.tag(
            span,
            "kernel.configured",
            if descriptor.is_some() { "true" } else { "false" },
        );
        if let Some(launch) = descriptor {
            sink.tag(span, "kernel.grid", &launch.grid().to_string());
            sink.tag(span, "kernel.block", &launch.block().to_string());
            sink.tag(span, "kernel.shared_mem", &launch.shared_mem().to_string());
            sink.tag(span, "kernel.stream", &launch.stream().to_string());
            sink.tag(span, "kernel.argc", &launch.args().len().to_string());
            sink.tag(span, "kernel.args", &launch.args_display());
        }
    }

    fn report(&self, record: &CallbackRecord, report: &DispatchReport) {
        self.stats.record(report);
        for err in &report.errors {
            tracing::warn!(
                error = %err,
                kind = err.kind_str(),
                call = %record.function_name,
                call_id = record.call_id,
                phase = ?record.phase,
                "engine error while intercepting call"
            );
        }
        tracing::trace!(
            call = %record.function_name,
            phase = ?record.phase,
            opened = ?report.opened,
            closed = ?report.closed,
            "call dispatched"
        );
        if let Some(event) = &report.launch {
            for observer in &self.observers {
                match event.phase {
                    CallPhase::Enter => observer.launch_entered(event),
                    CallPhase::Exit => observer.launch_completed(event),
                }
            }
        }
    }

    /// Removes the calling thread's context, warning if calls are still in
    /// flight or a launch is half assembled.
    pub fn release_thread_context(&self) -> Option<CallContext> {
        let ctx = context::take_thread_context(&self.owner)?;
        if !ctx.is_idle() {
            tracing::warn!(
                open_spans = ctx.spans.depth(),
                launch_open = ctx.assembler.is_valid(),
                "released call context with unfinished calls"
            );
        }
        Some(ctx)
    }

    /// Closes every span left open in `ctx` and discards any half-assembled
    /// launch. Leaked spans are tagged `call.unfinished` before submission.
    /// Returns the number of spans closed.
    pub fn close_unfinished(&self, ctx: &mut CallContext) -> usize {
        ctx.close_unfinished(&self.tracer)
    }
}

impl Drop for Dispatcher {
    /// Closes this thread's slot now. Slots on other threads are swept by
    /// those threads once the owner handle is gone.
    fn drop(&mut self) {
        if let Some(mut ctx) = context::take_thread_context(&self.owner) {
            ctx.close_unfinished(&self.tracer);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("id", &self.owner.id())
            .field("tracer", &self.tracer)
            .field("observers", &self.observers.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
