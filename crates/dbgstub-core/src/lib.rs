//! # dbgstub-core
//!
//! Capability interfaces and shared state for the dbgstub GDB remote stub.
//!
//! The protocol engine in `dbgstub-protocol` is written against three things
//! only, all defined here:
//!
//! - [`Transport`]: get/put one byte of the debug link
//! - [`Target`]: read/write one byte of target memory, resume, single-step
//! - [`DebugState`]: the stop signal and register file of the halted target,
//!   owned by the caller and lent to the engine for one session
//!
//! ## Architecture Support
//!
//! - **mock**: four anonymous 32-bit registers (tests, host demo)
//! - **i386**: GDB's 16-register 32-bit x86 layout, with trap-frame marshalling
//!
//! Trap hooking itself (IDT setup, port I/O) is left to the embedding program;
//! it only has to build a [`DebugState`] and call the session loop.

pub mod arch;
pub mod error;
pub mod prelude;
pub mod target;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use error::{Result, StubError, TargetError, TransportError};
pub use target::{RamTarget, Target};
pub use transport::{BufferTransport, IoTransport, Transport};
pub use types::{Address, DebugState, Signal, Word};
