//! # dbgstub-protocol
//!
//! The GDB Remote Serial Protocol engine.
//!
//! Layers, bottom-up:
//!
//! - [`codec`]: hex and escaped-binary encodings, integer parsing
//! - [`packet`]: `$payload#cs` framing, checksums and acknowledgments
//! - [`command`]: payload → [`Command`](command::Command)
//! - [`dispatch`]: executes a command against a [`Target`](dbgstub_core::Target)
//!   and replies
//! - [`session`]: the per-trap loop that ties them together
//!
//! The engine is synchronous and allocation-free: every buffer is a fixed-size
//! array on the session loop's stack.
//!
//! ## Example
//!
//! ```rust
//! use dbgstub_core::arch::Mock;
//! use dbgstub_core::types::{DebugState, Signal};
//! use dbgstub_core::{BufferTransport, RamTarget};
//! use dbgstub_protocol::{run_session, SessionEnd};
//!
//! // GDB reads all registers, then continues
//! let mut transport = BufferTransport::with_input(b"+$g#67+$c#63");
//! let mut target = RamTarget::<Mock>::new(16);
//! let mut state = DebugState::with_registers(Signal::TRAP, [1, 2, 3, 4]);
//!
//! assert_eq!(run_session(&mut transport, &mut target, &mut state).unwrap(), SessionEnd::Resumed);
//! ```

pub mod codec;
pub mod command;
pub mod dispatch;
pub mod packet;
pub mod session;

/// Size of the packet buffers, in bytes
///
/// Bounds both received payloads and encoded replies.
pub const PACKET_BUFFER_SIZE: usize = 256;

/// Largest memory transfer a single `m`, `M` or `X` may request
pub const MAX_MEMORY_TRANSFER: usize = 64;

/// Code sent in every `E` reply
pub const ERROR_CODE: u8 = 0;

pub use codec::CodecError;
pub use command::{Command, CommandError};
pub use dispatch::{dispatch, DispatchError};
pub use packet::{Ack, PacketError, PacketResult};
pub use session::{run_session, Session, SessionEnd};
