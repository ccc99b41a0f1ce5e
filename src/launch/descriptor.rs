//! The launch descriptor assembled from configure / bind / launch calls.

use crate::types::{ArgToken, Dim3, StreamHandle};
use core::fmt;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Inline capacity for kernel arguments before spilling to the heap.
pub const INLINE_ARGS: usize = 8;

/// One in-progress or fully specified kernel launch.
///
/// Starts invalid. A configure call fills the scalar fields and marks it
/// valid; each argument binding appends one token; the launch exit resets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchDescriptor {
    grid: Dim3,
    block: Dim3,
    shared_mem: u64,
    stream: StreamHandle,
    args: SmallVec<[ArgToken; INLINE_ARGS]>,
    valid: bool,
}

impl LaunchDescriptor {
    /// Grid dimensions.
    #[must_use]
    pub const fn grid(&self) -> Dim3 {
        self.grid
    }

    /// Block dimensions.
    #[must_use]
    pub const fn block(&self) -> Dim3 {
        self.block
    }

    /// Dynamic shared memory in bytes.
    #[must_use]
    pub const fn shared_mem(&self) -> u64 {
        self.shared_mem
    }

    /// Target stream.
    #[must_use]
    pub const fn stream(&self) -> StreamHandle {
        self.stream
    }

    /// Bound arguments in binding order.
    #[must_use]
    pub fn args(&self) -> &[ArgToken] {
        &self.args
    }

    /// Whether a configure call has been observed since the last reset.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn configure(
        &mut self,
        grid: Dim3,
        block: Dim3,
        shared_mem: u64,
        stream: StreamHandle,
    ) {
        self.grid = grid;
        self.block = block;
        self.shared_mem = shared_mem;
        self.stream = stream;
        self.args.clear();
        self.valid = true;
    }

    pub(crate) fn push_arg(&mut self, arg: ArgToken) {
        self.args.push(arg);
    }

    pub(crate) fn reset(&mut self) {
        self.valid = false;
        self.args.clear();
    }

    /// Comma-separated hex rendering of the argument list.
    #[must_use]
    pub fn args_display(&self) -> String {
        let mut out = String::new();
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&arg.to_string());
        }
        out
    }
}

impl fmt::Display for LaunchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("<unconfigured>");
        }
        write!(
            f,
            "<<<{}, {}, {}, {}>>>({})",
            self.grid,
            self.block,
            self.shared_mem,
            self.stream,
            self.args_display()
        )
    }
}
