//! Span stack correlator.
//!
//! Maps the flat enter/exit notification stream of one thread onto a nested
//! span hierarchy. Every entry pushes exactly one frame and every exit pops
//! exactly one, regardless of call kind, so calls issued from inside another
//! call's body (a launch that triggers driver calls, for instance) nest under
//! it without any kind-specific logic.
//!
//! ```text
//! enter(A)  [A]        A.parent = root
//! enter(B)  [A, B]     B.parent = A
//! exit(B)   [A]        B submitted
//! exit(A)   []         A submitted
//! ```
//!
//! When the configured depth limit is reached, entries push a placeholder
//! frame instead of opening a span. The matching exit pops the placeholder,
//! so pairing stays intact while backend span growth stays bounded.

use crate::error::EngineError;
use crate::tracer::Tracer;
use crate::types::SpanId;
use smallvec::SmallVec;

/// Inline frame capacity before the stack spills to the heap.
const INLINE_FRAMES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Span(SpanId),
    Suppressed,
}

/// Ordered stack of in-flight spans for one calling thread, innermost last.
#[derive(Debug, Clone)]
pub struct SpanStack {
    frames: SmallVec<[Frame; INLINE_FRAMES]>,
    max_depth: usize,
}

impl Default for SpanStack {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanStack {
    /// Creates an unbounded stack.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(usize::MAX)
    }

    /// Creates a stack that stops opening spans beyond `max_depth` frames.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            frames: SmallVec::new(),
            max_depth,
        }
    }

    /// Number of open frames, including placeholders.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no call is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Configured nesting limit.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Opens a child span of [`current`](Self::current) named `call_name` and
    /// pushes it.
    ///
    /// Beyond the depth limit a placeholder is pushed instead and
    /// [`EngineError::DepthExceeded`] is returned; the entry is still paired.
    pub fn on_call_enter(&mut self, tracer: &Tracer, call_name: &str) -> Result<SpanId, EngineError> {
        let depth = self.frames.len() + 1;
        if depth > self.max_depth {
            self.frames.push(Frame::Suppressed);
            return Err(EngineError::DepthExceeded {
                depth,
                limit: self.max_depth,
            });
        }
        let parent = self.current(tracer.root());
        let span = tracer.sink().create_child_span(parent, call_name);
        self.frames.push(Frame::Span(span));
        Ok(span)
    }

    /// Pops the innermost frame and submits its span with a client-send
    /// annotation for the tracer's current endpoint.
    ///
    /// Returns the submitted span, or `None` for a placeholder frame.
    pub fn on_call_exit(&mut self, tracer: &Tracer) -> Result<Option<SpanId>, EngineError> {
        match self.frames.pop() {
            None => Err(EngineError::StackUnderflow),
            Some(Frame::Suppressed) => Ok(None),
            Some(Frame::Span(span)) => {
                let sink = tracer.sink();
                sink.annotate_send(span, &tracer.endpoint());
                sink.submit(span);
                Ok(Some(span))
            }
        }
    }

    /// The innermost open span, or `root` when no span is open.
    #[must_use]
    pub fn current(&self, root: SpanId) -> SpanId {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| match frame {
                Frame::Span(span) => Some(*span),
                Frame::Suppressed => None,
            })
            .unwrap_or(root)
    }

    /// The span of the innermost frame, `None` if it is a placeholder or the
    /// stack is empty.
    #[must_use]
    pub fn top_span(&self) -> Option<SpanId> {
        match self.frames.last() {
            Some(Frame::Span(span)) => Some(*span),
            _ => None,
        }
    }

    /// Removes every frame, innermost first, returning the spans that were
    /// never closed.
    pub fn drain_leaked(&mut self) -> Vec<SpanId> {
        self.frames
            .drain(..)
            .rev()
            .filter_map(|frame| match frame {
                Frame::Span(span) => Some(span),
                Frame::Suppressed => None,
            })
            .collect()
    }
}
