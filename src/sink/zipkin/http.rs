//! HTTP transport posting span batches to a collector.

use super::SpanTransport;
use super::wire::ZipkinSpan;
use crate::sink::ExportError;
use reqwest::blocking::Client;
use std::time::Duration;

/// Posts JSON arrays of spans to a Zipkin v1 endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    /// Creates a transport for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ExportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::Client(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Collector URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SpanTransport for HttpTransport {
    fn send(&mut self, batch: &[ZipkinSpan]) -> Result<(), ExportError> {
        let response = self
            .client
            .post(&self.url)
            .json(batch)
            .send()
            .map_err(|e| ExportError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}
