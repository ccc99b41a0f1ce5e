//! Call context assembler.
//!
//! Reconstructs one [`LaunchDescriptor`] per logical launch from three call
//! kinds observed over time:
//!
//! ```text
//! configure(enter) ─► valid ──bind(enter)*──► launch(enter): readable
//!                                             launch(exit):  consumed + reset
//! ```
//!
//! Every call kind is reported at entry and at exit, but only the entry of
//! configure and bind carries parameters. Launch exit resets unconditionally,
//! so a launch that bypassed configure (a runtime-level launch entry point)
//! is tolerated and leaves no stale state behind.

use super::LaunchDescriptor;
use crate::error::ProtocolViolation;
use crate::types::{ArgToken, CallPhase, Dim3, StreamHandle};

/// Single-slot launch state machine for one calling thread.
#[derive(Debug, Default)]
pub struct CallContextAssembler {
    current: LaunchDescriptor,
}

impl CallContextAssembler {
    /// Creates an assembler with an invalid descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a descriptor is currently open.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.current.is_valid()
    }

    /// Copy of the open descriptor, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<LaunchDescriptor> {
        self.current.is_valid().then(|| self.current.clone())
    }

    /// Handles a configure call.
    ///
    /// On entry the descriptor must be invalid; a second configure before the
    /// launch exit is rejected and the first configuration is left untouched.
    pub fn on_configure(
        &mut self,
        phase: CallPhase,
        grid: Dim3,
        block: Dim3,
        shared_mem: u64,
        stream: StreamHandle,
    ) -> Result<(), ProtocolViolation> {
        if phase != CallPhase::Enter {
            return Ok(());
        }
        if self.current.is_valid() {
            return Err(ProtocolViolation::AlreadyConfigured);
        }
        self.current.configure(grid, block, shared_mem, stream);
        Ok(())
    }

    /// Handles an argument binding. Tokens are kept in binding order.
    pub fn on_bind_argument(
        &mut self,
        phase: CallPhase,
        arg: ArgToken,
    ) -> Result<(), ProtocolViolation> {
        if phase != CallPhase::Enter {
            return Ok(());
        }
        if !self.current.is_valid() {
            return Err(ProtocolViolation::ArgumentBeforeConfigure);
        }
        self.current.push_arg(arg);
        Ok(())
    }

    /// Handles the launch trigger.
    ///
    /// Entry returns a copy of the assembled descriptor without consuming it.
    /// Exit consumes it: the descriptor is returned (if it was configured) and
    /// the slot is reset whether or not it was.
    pub fn on_launch(&mut self, phase: CallPhase) -> Option<LaunchDescriptor> {
        match phase {
            CallPhase::Enter => self.snapshot(),
            CallPhase::Exit => {
                let consumed = self.snapshot();
                self.current.reset();
                consumed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configure(asm: &mut CallContextAssembler) -> Result<(), ProtocolViolation> {
        asm.on_configure(
            CallPhase::Enter,
            Dim3::new(1, 1, 1),
            Dim3::new(32, 1, 1),
            0,
            StreamHandle(0x5),
        )
    }

    #[test]
    fn well_formed_launch_collects_args_in_order() {
        let mut asm = CallContextAssembler::new();
        configure(&mut asm).expect("configure");
        asm.on_bind_argument(CallPhase::Enter, ArgToken(0xAAAA))
            .expect("bind");
        asm.on_bind_argument(CallPhase::Enter, ArgToken(0xBBBB))
            .expect("bind");
        asm.on_bind_argument(CallPhase::Exit, ArgToken(0xFFFF))
            .expect("bind exit");
        asm.on_bind_argument(CallPhase::Exit, ArgToken(0xFFFF))
            .expect("bind exit");

        let at_entry = asm.on_launch(CallPhase::Enter).expect("readable at entry");
        assert_eq!(at_entry.args(), &[ArgToken(0xAAAA), ArgToken(0xBBBB)]);
        assert!(asm.is_valid(), "entry must not consume");

        let consumed = asm.on_launch(CallPhase::Exit).expect("consumed at exit");
        assert_eq!(consumed.grid(), Dim3::new(1, 1, 1));
        assert_eq!(consumed.block(), Dim3::new(32, 1, 1));
        assert_eq!(consumed.stream(), StreamHandle(0x5));
        assert!(!asm.is_valid());
        assert!(asm.snapshot().is_none());
    }

    #[test]
    fn double_configure_is_rejected_and_keeps_first() {
        let mut asm = CallContextAssembler::new();
        configure(&mut asm).expect("first");
        asm.on_bind_argument(CallPhase::Enter, ArgToken(1))
            .expect("bind");
        let err = asm
            .on_configure(
                CallPhase::Enter,
                Dim3::new(9, 9, 9),
                Dim3::new(9, 9, 9),
                99,
                StreamHandle(9),
            )
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::AlreadyConfigured);

        let snap = asm.snapshot().expect("still valid");
        assert_eq!(snap.grid(), Dim3::new(1, 1, 1));
        assert_eq!(snap.args(), &[ArgToken(1)]);
    }

    #[test]
    fn configure_exit_is_noop() {
        let mut asm = CallContextAssembler::new();
        asm.on_configure(
            CallPhase::Exit,
            Dim3::default(),
            Dim3::default(),
            0,
            StreamHandle::DEFAULT,
        )
        .expect("exit is a no-op");
        assert!(!asm.is_valid());
    }

    #[test]
    fn bind_before_configure_is_rejected() {
        let mut asm = CallContextAssembler::new();
        let err = asm
            .on_bind_argument(CallPhase::Enter, ArgToken(1))
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::ArgumentBeforeConfigure);
        assert!(!asm.is_valid());
    }

    #[test]
    fn bare_launch_is_tolerated() {
        let mut asm = CallContextAssembler::new();
        assert!(asm.on_launch(CallPhase::Enter).is_none());
        assert!(asm.on_launch(CallPhase::Exit).is_none());
        assert!(!asm.is_valid());
        configure(&mut asm).expect("next launch configures cleanly");
    }
}
