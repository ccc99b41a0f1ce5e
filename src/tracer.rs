//! Process-wide tracer: root span, service endpoint, and shutdown ordering.
//!
//! The tracer is shared (`Arc<Tracer>`) by every dispatcher and thread. It
//! creates the root span once, at construction, and finalizes it exactly once
//! at [`Tracer::shutdown`] or on drop, after which the sink is flushed within
//! the configured bound.

use crate::config::TracerConfig;
use crate::sink::{ServiceEndpoint, TraceSink};
use crate::types::SpanId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared tracing state.
pub struct Tracer {
    sink: Arc<dyn TraceSink>,
    root: SpanId,
    endpoint: RwLock<ServiceEndpoint>,
    max_stack_depth: usize,
    shutdown_timeout: Duration,
    shut_down: AtomicBool,
}

impl Tracer {
    /// Creates a tracer over `sink` and opens the root span.
    #[must_use]
    pub fn new(config: &TracerConfig, sink: Arc<dyn TraceSink>) -> Self {
        let root = sink.create_root_span(&config.root_span_name);
        tracing::info!(
            root = %root,
            service = %config.service_name,
            "tracer started"
        );
        Self {
            sink,
            root,
            endpoint: RwLock::new(ServiceEndpoint::new(
                config.service_name.clone(),
                config.endpoint_addr,
                config.endpoint_port,
            )),
            max_stack_depth: config.max_stack_depth,
            shutdown_timeout: config.shutdown_timeout(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Validates `config` and creates a tracer exporting to its Zipkin
    /// collector over HTTP.
    #[cfg(feature = "http-collector")]
    pub fn from_config(config: &TracerConfig) -> crate::Result<Self> {
        config.validate()?;
        let sink = crate::sink::ZipkinSink::http(config)?;
        Ok(Self::new(config, Arc::new(sink)))
    }

    /// The root span: parent of every call entered on an empty stack.
    #[must_use]
    pub const fn root(&self) -> SpanId {
        self.root
    }

    /// The export sink.
    #[must_use]
    pub fn sink(&self) -> &dyn TraceSink {
        self.sink.as_ref()
    }

    /// The endpoint attached to spans submitted from now on.
    #[must_use]
    pub fn endpoint(&self) -> ServiceEndpoint {
        self.endpoint.read().clone()
    }

    /// Replaces the endpoint. Spans already submitted are unaffected.
    pub fn set_endpoint(&self, endpoint: ServiceEndpoint) {
        *self.endpoint.write() = endpoint;
    }

    /// Per-thread nesting limit for new call contexts.
    #[must_use]
    pub const fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Finalizes the root span and shuts the sink down.
    ///
    /// Runs once; later calls return `true` without doing anything. Returns
    /// whether the sink drained within the shutdown timeout.
    pub fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return true;
        }
        let endpoint = self.endpoint();
        self.sink.annotate_send(self.root, &endpoint);
        self.sink.submit(self.root);

        tracing::info!(timeout_ms = self.shutdown_timeout.as_millis() as u64, "shutting down collector");
        let drained = self.sink.shutdown(self.shutdown_timeout);
        if drained {
            tracing::info!("tracer shut down");
        } else {
            tracing::warn!("tracer shut down before all spans were delivered");
        }
        drained
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            self.shutdown();
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("root", &self.root)
            .field("endpoint", &*self.endpoint.read())
            .field("max_stack_depth", &self.max_stack_depth)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
