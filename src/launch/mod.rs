//! Kernel launch reconstruction.
//!
//! - [`descriptor`]: the assembled [`LaunchDescriptor`]
//! - [`assembler`]: the [`CallContextAssembler`] state machine

pub mod assembler;
pub mod descriptor;

pub use assembler::CallContextAssembler;
pub use descriptor::LaunchDescriptor;
