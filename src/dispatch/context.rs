//! Per-thread call context.
//!
//! The launch descriptor and the span stack are single-thread state. Each
//! calling thread gets its own [`CallContext`] per dispatcher, held in a
//! thread-local table, so no cross-thread locking is involved on the
//! interception path.
//!
//! A dispatcher can only clear the slot of the thread that drops it. Slots
//! on other threads hold weak handles to their owner and are swept on that
//! thread's next access once the owner is gone. Spans still open in a swept
//! slot are closed as unfinished if the tracer is still alive.

use crate::correlator::SpanStack;
use crate::launch::CallContextAssembler;
use crate::tracer::Tracer;
use crate::types::CallPhase;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

thread_local! {
    static THREAD_CONTEXTS: RefCell<HashMap<u64, Slot>> = RefCell::new(HashMap::new());
}

/// Identity and liveness of the dispatcher owning a set of thread slots.
#[derive(Debug)]
pub(crate) struct ContextOwner {
    id: u64,
    alive: Arc<()>,
}

impl ContextOwner {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            alive: Arc::new(()),
        }
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }
}

struct Slot {
    owner: Weak<()>,
    tracer: Weak<Tracer>,
    ctx: CallContext,
}

impl Slot {
    fn is_orphaned(&self) -> bool {
        self.owner.strong_count() == 0
    }
}

/// Launch assembler and span stack for one calling thread.
#[derive(Debug, Default)]
pub struct CallContext {
    pub(crate) assembler: CallContextAssembler,
    pub(crate) spans: SpanStack,
}

impl CallContext {
    /// Creates a context with an unbounded span stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context whose span stack stops opening spans past `max_depth`.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            assembler: CallContextAssembler::new(),
            spans: SpanStack::with_max_depth(max_depth),
        }
    }

    /// The launch assembler.
    #[must_use]
    pub fn assembler(&self) -> &CallContextAssembler {
        &self.assembler
    }

    /// The span stack.
    #[must_use]
    pub fn spans(&self) -> &SpanStack {
        &self.spans
    }

    /// Whether no call is in flight and no launch is being assembled.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.spans.is_empty() && !self.assembler.is_valid()
    }

    /// Submits every span left open as `call.unfinished` and discards any
    /// half-assembled launch. Returns the number of spans closed.
    pub(crate) fn close_unfinished(&mut self, tracer: &Tracer) -> usize {
        let sink = tracer.sink();
        let endpoint = tracer.endpoint();
        let leaked = self.spans.drain_leaked();
        for span in &leaked {
            sink.tag(*span, "call.unfinished", "true");
            sink.annotate_send(*span, &endpoint);
            sink.submit(*span);
        }
        let _ = self.assembler.on_launch(CallPhase::Exit);
        leaked.len()
    }
}

/// Runs `f` on the calling thread's context for `owner`, creating it on first
/// use. Returns `None` if the context is already borrowed further up the
/// stack (a reentrant dispatch).
pub(crate) fn with_thread_context<R>(
    owner: &ContextOwner,
    tracer: &Arc<Tracer>,
    f: impl FnOnce(&mut CallContext) -> R,
) -> Option<R> {
    THREAD_CONTEXTS
        .try_with(|contexts| {
            let (result, orphans) = {
                let mut contexts = contexts.try_borrow_mut().ok()?;
                let orphans = take_orphans(&mut contexts);
                let slot = contexts.entry(owner.id).or_insert_with(|| Slot {
                    owner: Arc::downgrade(&owner.alive),
                    tracer: Arc::downgrade(tracer),
                    ctx: CallContext::with_max_depth(tracer.max_stack_depth()),
                });
                (f(&mut slot.ctx), orphans)
            };
            // closed outside the borrow: the sink may dispatch again
            for slot in orphans {
                close_orphan(slot);
            }
            Some(result)
        })
        .ok()
        .flatten()
}

/// Removes and returns the calling thread's context for `owner`.
pub(crate) fn take_thread_context(owner: &ContextOwner) -> Option<CallContext> {
    THREAD_CONTEXTS
        .try_with(|contexts| {
            contexts
                .try_borrow_mut()
                .ok()
                .and_then(|mut contexts| contexts.remove(&owner.id))
                .map(|slot| slot.ctx)
        })
        .ok()
        .flatten()
}

fn take_orphans(contexts: &mut HashMap<u64, Slot>) -> Vec<Slot> {
    if !contexts.values().any(Slot::is_orphaned) {
        return Vec::new();
    }
    let dead: Vec<u64> = contexts
        .iter()
        .filter(|(_, slot)| slot.is_orphaned())
        .map(|(id, _)| *id)
        .collect();
    dead.iter().filter_map(|id| contexts.remove(id)).collect()
}

fn close_orphan(mut slot: Slot) {
    if slot.ctx.is_idle() {
        return;
    }
    let open_spans = slot.ctx.spans.depth();
    let closed = slot
        .tracer
        .upgrade()
        .map_or(0, |tracer| slot.ctx.close_unfinished(&tracer));
    tracing::warn!(
        open_spans,
        closed,
        "swept call context of a dropped dispatcher"
    );
}

/// Number of live slots on the calling thread.
#[cfg(test)]
pub(crate) fn thread_context_count() -> usize {
    THREAD_CONTEXTS.with(|contexts| contexts.borrow().len())
}
