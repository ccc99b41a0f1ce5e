//! Zipkin v1 JSON span records.

use crate::sink::ServiceEndpoint;
use serde::{Deserialize, Serialize};

/// Annotation value for a client send.
pub const CLIENT_SEND: &str = "cs";

/// Timestamped event on a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Event code, e.g. `cs`.
    pub value: String,
    /// Where the event happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ServiceEndpoint>,
}

/// String key/value attached to a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryAnnotation {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
    /// Where the tag was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ServiceEndpoint>,
}

/// One finished span as posted to `/api/v1/spans`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipkinSpan {
    /// 16 hex digit trace ID.
    pub trace_id: String,
    /// Span name.
    pub name: String,
    /// 16 hex digit span ID.
    pub id: String,
    /// 16 hex digit parent ID, absent for roots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Start, microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Duration in microseconds.
    pub duration: u64,
    /// Timestamped events.
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Tags.
    #[serde(default)]
    pub binary_annotations: Vec<BinaryAnnotation>,
}
