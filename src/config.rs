//! Tracer configuration.
//!
//! Defaults reproduce a local Zipkin collector on `127.0.0.1:9411`. Values can
//! be layered: defaults, then an optional TOML file (feature `config-file`),
//! then `LAUNCHSPAN_*` environment variables.
//!
//! ```
//! use launchspan::config::TracerConfig;
//!
//! let config = TracerConfig::default().with_service_name("trainer");
//! assert_eq!(config.endpoint_port, 9411);
//! config.validate().unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

/// Default Zipkin v1 collector URL.
pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:9411/api/v1/spans";
/// Default service name attached to every send annotation.
pub const DEFAULT_SERVICE_NAME: &str = "service_name";
/// Default name of the process-wide root span.
pub const DEFAULT_ROOT_SPAN_NAME: &str = "global";

/// Environment variable overriding [`TracerConfig::collector_url`].
pub const ENV_COLLECTOR_URL: &str = "LAUNCHSPAN_COLLECTOR_URL";
/// Environment variable overriding [`TracerConfig::service_name`].
pub const ENV_SERVICE_NAME: &str = "LAUNCHSPAN_SERVICE_NAME";
/// Environment variable overriding [`TracerConfig::endpoint_addr`].
pub const ENV_ENDPOINT_ADDR: &str = "LAUNCHSPAN_ENDPOINT_ADDR";
/// Environment variable overriding [`TracerConfig::endpoint_port`].
pub const ENV_ENDPOINT_PORT: &str = "LAUNCHSPAN_ENDPOINT_PORT";
/// Environment variable overriding [`TracerConfig::max_stack_depth`].
pub const ENV_MAX_STACK_DEPTH: &str = "LAUNCHSPAN_MAX_STACK_DEPTH";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value the tracer cannot run with.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for this schema.
    #[cfg(feature = "config-file")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Process-wide tracer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Collector endpoint that receives span batches.
    pub collector_url: String,
    /// Service name reported in send annotations.
    pub service_name: String,
    /// Address reported for this service.
    pub endpoint_addr: Ipv4Addr,
    /// Port reported for this service.
    pub endpoint_port: u16,
    /// Name of the root span.
    pub root_span_name: String,
    /// Per-thread nesting limit before entries stop opening spans.
    pub max_stack_depth: usize,
    /// Maximum spans per collector request.
    pub batch_size: usize,
    /// Finished spans buffered before new ones are dropped.
    pub queue_capacity: usize,
    /// Reporter flush period.
    pub flush_interval_ms: u64,
    /// Bound on the final flush at shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            endpoint_addr: Ipv4Addr::LOCALHOST,
            endpoint_port: 9411,
            root_span_name: DEFAULT_ROOT_SPAN_NAME.to_string(),
            max_stack_depth: 256,
            batch_size: 64,
            queue_capacity: 4096,
            flush_interval_ms: 500,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl TracerConfig {
    /// Sets the collector URL.
    #[must_use]
    pub fn with_collector_url(mut self, url: impl Into<String>) -> Self {
        self.collector_url = url.into();
        self
    }

    /// Sets the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Sets the reported service address and port.
    #[must_use]
    pub fn with_endpoint(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.endpoint_addr = addr;
        self.endpoint_port = port;
        self
    }

    /// Sets the per-thread nesting limit.
    #[must_use]
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Sets the reporter batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the reporter flush period.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Reporter flush period.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Bound on the final flush at shutdown.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Parses a TOML document. Missing keys take their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Applies `LAUNCHSPAN_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Applies overrides from an arbitrary lookup. Unset variables keep the
    /// current value.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_COLLECTOR_URL) {
            self.collector_url = url;
        }
        if let Some(name) = lookup(ENV_SERVICE_NAME) {
            self.service_name = name;
        }
        if let Some(raw) = lookup(ENV_ENDPOINT_ADDR) {
            self.endpoint_addr = parse_env(ENV_ENDPOINT_ADDR, raw)?;
        }
        if let Some(raw) = lookup(ENV_ENDPOINT_PORT) {
            self.endpoint_port = parse_env(ENV_ENDPOINT_PORT, raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_STACK_DEPTH) {
            self.max_stack_depth = parse_env(ENV_MAX_STACK_DEPTH, raw)?;
        }
        Ok(self)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            }
        }

        if self.collector_url.trim().is_empty() {
            return Err(invalid("collector_url", "must not be empty"));
        }
        if self.service_name.is_empty() {
            return Err(invalid("service_name", "must not be empty"));
        }
        if self.root_span_name.is_empty() {
            return Err(invalid("root_span_name", "must not be empty"));
        }
        if self.max_stack_depth == 0 {
            return Err(invalid("max_stack_depth", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be at least 1"));
        }
        if self.flush_interval_ms == 0 {
            return Err(invalid("flush_interval_ms", "must be at least 1"));
        }
        if self.batch_size > self.queue_capacity {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                reason: format!(
                    "{} exceeds queue_capacity {}",
                    self.batch_size, self.queue_capacity
                ),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value: raw })
}
