//! Zipkin exporter.
//!
//! Open spans live in a mutex-guarded table keyed by [`SpanId`]. Submitting a
//! span removes it from the table, stamps its duration, converts it to a v1
//! JSON record, and hands it to the background [`reporter`] without blocking.

mod reporter;
pub mod wire;

#[cfg(feature = "http-collector")]
mod http;

#[cfg(feature = "http-collector")]
pub use http::HttpTransport;
pub use reporter::{ReporterStats, SpanTransport};

use self::reporter::Reporter;
use self::wire::{Annotation, BinaryAnnotation, CLIENT_SEND, ZipkinSpan};
use super::{ExportError, ServiceEndpoint, TraceSink, now_micros};
use crate::config::TracerConfig;
use crate::types::{SpanId, TraceId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug)]
struct OpenSpan {
    name: String,
    parent: Option<SpanId>,
    start_us: u64,
    tags: Vec<(String, String)>,
    send: Option<(u64, ServiceEndpoint)>,
}

/// [`TraceSink`] that exports finished spans to a Zipkin collector.
#[derive(Debug)]
pub struct ZipkinSink {
    trace_id: TraceId,
    open: Mutex<HashMap<SpanId, OpenSpan>>,
    reporter: Reporter,
}

impl ZipkinSink {
    /// Starts a sink that delivers through `transport`, sized by `config`.
    pub fn new<T: SpanTransport>(config: &TracerConfig, transport: T) -> Result<Self, ExportError> {
        let reporter = Reporter::spawn(
            transport,
            config.queue_capacity,
            config.batch_size,
            config.flush_interval(),
        )?;
        Ok(Self {
            trace_id: TraceId::random(),
            open: Mutex::new(HashMap::new()),
            reporter,
        })
    }

    /// Starts a sink that posts to `config.collector_url` over HTTP.
    #[cfg(feature = "http-collector")]
    pub fn http(config: &TracerConfig) -> Result<Self, ExportError> {
        let transport = HttpTransport::new(&config.collector_url, config.shutdown_timeout())?;
        Self::new(config, transport)
    }

    /// Trace ID shared by every span of this sink.
    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Number of spans created but not yet submitted.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Delivery counters.
    #[must_use]
    pub fn stats(&self) -> ReporterStats {
        self.reporter.stats()
    }

    fn create(&self, parent: Option<SpanId>, name: &str) -> SpanId {
        let id = SpanId::new();
        self.open.lock().insert(
            id,
            OpenSpan {
                name: name.to_string(),
                parent,
                start_us: now_micros(),
                tags: Vec::new(),
                send: None,
            },
        );
        id
    }

    fn finish(&self, id: SpanId, span: OpenSpan) -> ZipkinSpan {
        let end_us = now_micros();
        let endpoint = span.send.as_ref().map(|(_, ep)| ep.clone());
        let annotations = span
            .send
            .into_iter()
            .map(|(timestamp, endpoint)| Annotation {
                timestamp,
                value: CLIENT_SEND.to_string(),
                endpoint: Some(endpoint),
            })
            .collect();
        let binary_annotations = span
            .tags
            .into_iter()
            .map(|(key, value)| BinaryAnnotation {
                key,
                value,
                endpoint: endpoint.clone(),
            })
            .collect();
        ZipkinSpan {
            trace_id: self.trace_id.to_hex(),
            name: span.name,
            id: id.to_hex(),
            parent_id: span.parent.map(SpanId::to_hex),
            timestamp: span.start_us,
            duration: end_us.saturating_sub(span.start_us),
            annotations,
            binary_annotations,
        }
    }
}

impl TraceSink for ZipkinSink {
    fn create_root_span(&self, name: &str) -> SpanId {
        self.create(None, name)
    }

    fn create_child_span(&self, parent: SpanId, name: &str) -> SpanId {
        self.create(Some(parent), name)
    }

    fn tag(&self, span: SpanId, key: &str, value: &str) {
        match self.open.lock().get_mut(&span) {
            Some(open) => open.tags.push((key.to_string(), value.to_string())),
            None => tracing::debug!(%span, key, "tag on unknown span ignored"),
        }
    }

    fn annotate_send(&self, span: SpanId, endpoint: &ServiceEndpoint) {
        match self.open.lock().get_mut(&span) {
            Some(open) => open.send = Some((now_micros(), endpoint.clone())),
            None => tracing::debug!(%span, "send annotation on unknown span ignored"),
        }
    }

    fn submit(&self, span: SpanId) {
        let Some(open) = self.open.lock().remove(&span) else {
            tracing::debug!(%span, "submit of unknown span ignored");
            return;
        };
        let record = self.finish(span, open);
        self.reporter.enqueue(record);
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.reporter.flush(timeout)
    }

    fn shutdown(&self, timeout: Duration) -> bool {
        let open = self.open_count();
        if open > 0 {
            tracing::warn!(open, "shutting down with unsubmitted spans");
        }
        self.reporter.shutdown(timeout)
    }
}
