//! Intercepted call records and their parameter blocks.
//!
//! A [`CallbackRecord`] is what the external callback subsystem hands the
//! engine once at call entry and once at call exit. Only the runtime-domain
//! launch protocol calls (configure, setup-argument, launch) and memcpy carry
//! parameters the engine interprets; everything else is opaque and only
//! participates in span nesting.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Three-component launch dimension (grid or block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dim3 {
    /// Extent along x.
    pub x: u32,
    /// Extent along y.
    pub y: u32,
    /// Extent along z.
    pub z: u32,
}

impl Dim3 {
    /// Creates a dimension from its three extents.
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total number of elements (`x * y * z`), saturating.
    #[must_use]
    pub const fn volume(self) -> u64 {
        (self.x as u64)
            .saturating_mul(self.y as u64)
            .saturating_mul(self.z as u64)
    }
}

impl Default for Dim3 {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

impl From<(u32, u32, u32)> for Dim3 {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Self::new(x, y, z)
    }
}

/// Opaque execution stream handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamHandle(pub u64);

impl StreamHandle {
    /// The legacy default stream.
    pub const DEFAULT: Self = Self(0);
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Address-sized opaque argument value.
///
/// The token is the raw bits of the bound argument; its pointee (if any) is
/// never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgToken(pub usize);

impl fmt::Display for ArgToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Which side of an intercepted call a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// Delivered before the call body runs.
    Enter,
    /// Delivered after the call body returns.
    Exit,
}

impl CallPhase {
    /// Returns true for [`CallPhase::Enter`].
    #[must_use]
    pub const fn is_enter(self) -> bool {
        matches!(self, Self::Enter)
    }
}

/// API surface an intercepted call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDomain {
    /// The high-level runtime API.
    Runtime,
    /// The low-level driver API.
    Driver,
}

impl CallDomain {
    /// Returns the domain name used in span tags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Driver => "driver",
        }
    }
}

/// Direction of a memory copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemcpyKind {
    /// Host to host.
    HostToHost,
    /// Host to device.
    HostToDevice,
    /// Device to host.
    DeviceToHost,
    /// Device to device.
    DeviceToDevice,
    /// Inferred from pointer values (unified addressing).
    Default,
}

impl MemcpyKind {
    /// Returns the kind name used in span tags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HostToHost => "host_to_host",
            Self::HostToDevice => "host_to_device",
            Self::DeviceToHost => "device_to_host",
            Self::DeviceToDevice => "device_to_device",
            Self::Default => "default",
        }
    }
}

/// Kind-specific parameter block of an intercepted call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallParams {
    /// Launch configuration: opens a launch descriptor.
    Configure {
        /// Grid dimensions.
        grid: Dim3,
        /// Block dimensions.
        block: Dim3,
        /// Dynamic shared memory in bytes.
        shared_mem: u64,
        /// Target stream.
        stream: StreamHandle,
    },
    /// One argument binding for the configured launch.
    SetupArgument {
        /// The argument value.
        arg: ArgToken,
        /// Declared argument size in bytes (captured, not interpreted).
        #[serde(default)]
        size: u64,
        /// Offset in the parameter buffer (captured, not interpreted).
        #[serde(default)]
        offset: u64,
    },
    /// The launch trigger.
    Launch {
        /// Kernel symbol name.
        symbol: String,
    },
    /// A synchronous memory copy.
    Memcpy {
        /// Destination address.
        dst: u64,
        /// Source address.
        src: u64,
        /// Byte count.
        count: u64,
        /// Copy direction.
        kind: MemcpyKind,
    },
    /// Any call whose parameters are not interpreted.
    #[default]
    None,
}

/// How the dispatcher routes a call beyond span push/pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Launch configuration.
    Configure,
    /// Launch argument binding.
    SetupArgument,
    /// Launch trigger.
    Launch,
    /// Memory copy.
    Memcpy,
    /// Span only.
    Untracked,
}

/// One enter or exit notification for an intercepted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRecord {
    /// API domain.
    pub domain: CallDomain,
    /// Runtime-assigned callback identifier.
    pub call_id: u32,
    /// Entry or exit.
    pub phase: CallPhase,
    /// API function name; used as the span name.
    pub function_name: String,
    /// Kind-specific parameters.
    #[serde(default)]
    pub params: CallParams,
    /// Device timestamp sampled by the callback subsystem, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_timestamp_ns: Option<u64>,
}

impl CallbackRecord {
    /// Creates a runtime-domain record.
    #[must_use]
    pub fn runtime(
        call_id: u32,
        phase: CallPhase,
        function_name: impl Into<String>,
        params: CallParams,
    ) -> Self {
        Self {
            domain: CallDomain::Runtime,
            call_id,
            phase,
            function_name: function_name.into(),
            params,
            device_timestamp_ns: None,
        }
    }

    /// Creates a driver-domain record with no interpreted parameters.
    #[must_use]
    pub fn driver(call_id: u32, phase: CallPhase, function_name: impl Into<String>) -> Self {
        Self {
            domain: CallDomain::Driver,
            call_id,
            phase,
            function_name: function_name.into(),
            params: CallParams::None,
            device_timestamp_ns: None,
        }
    }

    /// Attaches a device timestamp.
    #[must_use]
    pub fn with_device_timestamp(mut self, ns: u64) -> Self {
        self.device_timestamp_ns = Some(ns);
        self
    }

    /// Classifies the call for routing.
    ///
    /// Driver-domain calls are never routed to kind-specific handling.
    #[must_use]
    pub fn kind(&self) -> CallKind {
        if self.domain != CallDomain::Runtime {
            return CallKind::Untracked;
        }
        match self.params {
            CallParams::Configure { .. } => CallKind::Configure,
            CallParams::SetupArgument { .. } => CallKind::SetupArgument,
            CallParams::Launch { .. } => CallKind::Launch,
            CallParams::Memcpy { .. } => CallKind::Memcpy,
            CallParams::None => CallKind::Untracked,
        }
    }

    /// Returns the span name for this call.
    #[must_use]
    pub fn span_name(&self) -> &str {
        if self.function_name.is_empty() {
            "<unnamed>"
        } else {
            &self.function_name
        }
    }
}
