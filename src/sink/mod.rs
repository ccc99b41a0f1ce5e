//! Trace export sinks.
//!
//! The engine never owns span data. It holds [`SpanId`] handles and drives a
//! [`TraceSink`] through a narrow interface: create, tag, annotate, submit.
//! Submission is fire-and-forget; delivery failures are absorbed by the sink.
//!
//! - [`memory`]: in-process recorder for tests and replay
//! - [`zipkin`]: batching Zipkin v1 exporter with a background reporter

pub mod memory;
pub mod zipkin;

pub use memory::{MemorySink, RecordedSpan};
pub use zipkin::{ReporterStats, SpanTransport, ZipkinSink};
#[cfg(feature = "http-collector")]
pub use zipkin::HttpTransport;

use crate::types::SpanId;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Service address attached to client-send annotations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    /// Logical service name.
    pub service_name: String,
    /// Service IPv4 address.
    pub ipv4: Ipv4Addr,
    /// Service port.
    pub port: u16,
}

impl ServiceEndpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(service_name: impl Into<String>, ipv4: Ipv4Addr, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            ipv4,
            port,
        }
    }
}

/// Collector export failures. Absorbed by sinks, never seen by the engine.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The reporter thread could not be started.
    #[error("failed to start reporter thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The HTTP client could not be constructed.
    #[error("failed to build collector client: {0}")]
    Client(String),
    /// The request did not complete.
    #[error("collector request failed: {0}")]
    Request(String),
    /// The collector rejected the batch.
    #[error("collector {url} answered HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Collector URL.
        url: String,
    },
}

/// Backend that owns span data and delivers finished spans.
///
/// Operations on unknown or already submitted spans are ignored. `submit`
/// must not block on delivery.
pub trait TraceSink: Send + Sync {
    /// Creates a parentless span.
    fn create_root_span(&self, name: &str) -> SpanId;

    /// Creates a span whose parent is fixed to `parent`.
    fn create_child_span(&self, parent: SpanId, name: &str) -> SpanId;

    /// Attaches a string key/value tag.
    fn tag(&self, span: SpanId, key: &str, value: &str);

    /// Marks the span with a client-send annotation for `endpoint`.
    fn annotate_send(&self, span: SpanId, endpoint: &ServiceEndpoint);

    /// Finalizes the span for export. Each span is submitted at most once.
    fn submit(&self, span: SpanId);

    /// Waits up to `timeout` for submitted spans to be delivered.
    /// Returns whether everything was delivered.
    fn flush(&self, _timeout: Duration) -> bool {
        true
    }

    /// Flushes and releases delivery resources. Later submissions may be dropped.
    fn shutdown(&self, timeout: Duration) -> bool {
        self.flush(timeout)
    }
}

/// Microseconds since the Unix epoch.
pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_micros() as u64)
}
