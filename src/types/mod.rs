//! Core types shared by the engine.
//!
//! - [`id`]: Identifier types (`SpanId`, `TraceId`)
//! - [`call`]: Intercepted call records, parameter blocks, launch dimensions

pub mod call;
pub mod id;

pub use call::{
    ArgToken, CallDomain, CallKind, CallParams, CallPhase, CallbackRecord, Dim3, MemcpyKind,
    StreamHandle,
};
pub use id::{SpanId, TraceId};
