//! Launchspan: kernel-launch reconstruction and call-nesting spans for
//! intercepted compute-runtime callbacks.
//!
//! # Overview
//!
//! A callback subsystem delivers one notification at the entry and one at the
//! exit of every intercepted API call. Launchspan turns that flat stream into
//! two things:
//!
//! - **Launch descriptors**: the configure / bind-argument / launch sequence is
//!   assembled into one [`LaunchDescriptor`] per kernel launch.
//! - **Nested spans**: every entry opens a child of the innermost in-flight
//!   span and every exit submits it, so spans mirror real call nesting.
//!
//! Spans are exported through a [`TraceSink`]. [`ZipkinSink`] batches them to
//! a Zipkin v1 collector on a background reporter thread; [`MemorySink`]
//! records them in process.
//!
//! # Module Structure
//!
//! - [`types`]: identifiers and callback records
//! - [`launch`]: launch descriptor and call context assembler
//! - [`correlator`]: per-thread span stack
//! - [`dispatch`]: routing of notifications, per-thread contexts, observers
//! - [`tracer`]: root span, endpoint, and shutdown ordering
//! - [`sink`]: export sinks
//! - [`config`]: tracer configuration
//! - [`error`](mod@error): error types
//!
//! # Example
//!
//! ```
//! use launchspan::{
//!     CallParams, CallPhase, CallbackRecord, Dispatcher, MemorySink, Tracer, TracerConfig,
//! };
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let tracer = Arc::new(Tracer::new(&TracerConfig::default(), sink.clone()));
//! let dispatcher = Dispatcher::new(tracer.clone());
//!
//! let enter = CallbackRecord::runtime(1, CallPhase::Enter, "cudaMalloc", CallParams::None);
//! let exit = CallbackRecord::runtime(1, CallPhase::Exit, "cudaMalloc", CallParams::None);
//! let span = dispatcher.dispatch(&enter).opened.unwrap();
//! assert_eq!(dispatcher.dispatch(&exit).closed, Some(span));
//!
//! tracer.shutdown();
//! assert_eq!(sink.submitted().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod launch;
pub mod sink;
pub mod tracer;
pub mod types;

pub use config::{ConfigError, TracerConfig};
pub use correlator::SpanStack;
pub use dispatch::{
    CallContext, DispatchReport, DispatchStats, DispatchStatsSnapshot, Dispatcher, LaunchEvent,
    LaunchObserver,
};
pub use error::{EngineError, Error, ProtocolViolation, Result};
pub use launch::{CallContextAssembler, LaunchDescriptor};
#[cfg(feature = "http-collector")]
pub use sink::HttpTransport;
pub use sink::{
    ExportError, MemorySink, RecordedSpan, ReporterStats, ServiceEndpoint, SpanTransport,
    TraceSink, ZipkinSink,
};
pub use tracer::Tracer;
pub use types::{
    ArgToken, CallDomain, CallKind, CallParams, CallPhase, CallbackRecord, Dim3, MemcpyKind,
    SpanId, StreamHandle, TraceId,
};
