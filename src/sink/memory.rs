//! In-process span recorder.
//!
//! Keeps every span it creates, submitted or not, so callers can inspect
//! parentage, tags, and submission order after the fact.

use super::{ServiceEndpoint, TraceSink};
use crate::types::SpanId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Write as _;

/// A span as seen by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSpan {
    /// Span handle.
    pub id: SpanId,
    /// Parent span, `None` for roots.
    pub parent: Option<SpanId>,
    /// Span name.
    pub name: String,
    /// Tags in insertion order.
    pub tags: Vec<(String, String)>,
    /// Endpoint from the client-send annotation, if annotated.
    pub send_endpoint: Option<ServiceEndpoint>,
    /// Position in submission order, `None` while open.
    pub submit_seq: Option<u64>,
}

impl RecordedSpan {
    /// Returns the last value recorded for `key`.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the span has been submitted.
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        self.submit_seq.is_some()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    spans: HashMap<SpanId, RecordedSpan>,
    created: Vec<SpanId>,
    next_submit: u64,
    duplicate_submits: u64,
    unknown_ops: u64,
}

impl MemoryState {
    fn create(&mut self, parent: Option<SpanId>, name: &str) -> SpanId {
        let id = SpanId::new();
        self.spans.insert(
            id,
            RecordedSpan {
                id,
                parent,
                name: name.to_string(),
                tags: Vec::new(),
                send_endpoint: None,
                submit_seq: None,
            },
        );
        self.created.push(id);
        id
    }

    fn open_mut(&mut self, id: SpanId) -> Option<&mut RecordedSpan> {
        match self.spans.get_mut(&id) {
            Some(span) if !span.is_submitted() => Some(span),
            _ => {
                self.unknown_ops += 1;
                None
            }
        }
    }
}

/// Thread-safe in-memory [`TraceSink`].
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All spans in creation order.
    #[must_use]
    pub fn spans(&self) -> Vec<RecordedSpan> {
        let state = self.state.lock();
        state
            .created
            .iter()
            .filter_map(|id| state.spans.get(id).cloned())
            .collect()
    }

    /// One span by handle.
    #[must_use]
    pub fn span(&self, id: SpanId) -> Option<RecordedSpan> {
        self.state.lock().spans.get(&id).cloned()
    }

    /// Submitted spans in submission order.
    #[must_use]
    pub fn submitted(&self) -> Vec<RecordedSpan> {
        let mut spans: Vec<_> = self
            .state
            .lock()
            .spans
            .values()
            .filter(|s| s.is_submitted())
            .cloned()
            .collect();
        spans.sort_by_key(|s| s.submit_seq);
        spans
    }

    /// Spans created but not yet submitted, in creation order.
    #[must_use]
    pub fn open_spans(&self) -> Vec<RecordedSpan> {
        self.spans()
            .into_iter()
            .filter(|s| !s.is_submitted())
            .collect()
    }

    /// Direct children of `parent` in creation order.
    #[must_use]
    pub fn children(&self, parent: SpanId) -> Vec<RecordedSpan> {
        self.spans()
            .into_iter()
            .filter(|s| s.parent == Some(parent))
            .collect()
    }

    /// Number of `submit` calls on already submitted spans.
    #[must_use]
    pub fn duplicate_submits(&self) -> u64 {
        self.state.lock().duplicate_submits
    }

    /// Number of tag/annotate/submit calls on unknown or finished spans,
    /// excluding duplicate submits.
    #[must_use]
    pub fn unknown_ops(&self) -> u64 {
        self.state.lock().unknown_ops
    }

    /// Renders the subtree under `root` as an indented outline.
    ///
    /// Open spans are suffixed with `(open)`.
    #[must_use]
    pub fn render_tree(&self, root: SpanId) -> String {
        let spans = self.spans();
        let mut children: HashMap<SpanId, Vec<&RecordedSpan>> = HashMap::new();
        for span in &spans {
            if let Some(parent) = span.parent {
                children.entry(parent).or_default().push(span);
            }
        }

        let mut out = String::new();
        let Some(root_span) = spans.iter().find(|s| s.id == root) else {
            return out;
        };
        let mut stack = vec![(root_span, 0usize)];
        while let Some((span, indent)) = stack.pop() {
            let _ = write!(out, "{:width$}{}", "", span.name, width = indent * 2);
            if !span.is_submitted() {
                out.push_str(" (open)");
            }
            out.push('\n');
            if let Some(kids) = children.get(&span.id) {
                for kid in kids.iter().rev() {
                    stack.push((kid, indent + 1));
                }
            }
        }
        out
    }
}

impl TraceSink for MemorySink {
    fn create_root_span(&self, name: &str) -> SpanId {
        self.state.lock().create(None, name)
    }

    fn create_child_span(&self, parent: SpanId, name: &str) -> SpanId {
        self.state.lock().create(Some(parent), name)
    }

    fn tag(&self, span: SpanId, key: &str, value: &str) {
        if let Some(span) = self.state.lock().open_mut(span) {
            span.tags.push((key.to_string(), value.to_string()));
        }
    }

    fn annotate_send(&self, span: SpanId, endpoint: &ServiceEndpoint) {
        if let Some(span) = self.state.lock().open_mut(span) {
            span.send_endpoint = Some(endpoint.clone());
        }
    }

    fn submit(&self, span: SpanId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let seq = state.next_submit;
        match state.spans.get_mut(&span) {
            Some(recorded) if recorded.is_submitted() => state.duplicate_submits += 1,
            Some(recorded) => {
                recorded.submit_seq = Some(seq);
                state.next_submit += 1;
            }
            None => state.unknown_ops += 1,
        }
    }
}
