//! # Session Loop
//!
//! Runs one debugging session: from the moment the target traps until the
//! debugger lets it run again.
//!
//! ```text
//!   trap ──▶ announce signal ──▶ receive ──▶ dispatch ──┐
//!                                   ▲                   │
//!                                   └─── reply sent ◀───┤
//!                                                       │
//!   target runs ◀──────────────── `c` / `s` ◀───────────┘
//! ```
//!
//! A host re-enters the loop every time the target stops again. [`Session`]
//! keeps the transport and target together between those entries.

use dbgstub_core::error::TransportError;
use dbgstub_core::types::DebugState;
use dbgstub_core::{Target, Transport};
use tracing::{debug, info, warn};

use crate::dispatch::dispatch;
use crate::packet::{receive_packet, send_console_message, send_error_packet, send_signal_packet, PacketError, PacketResult};
use crate::{ERROR_CODE, PACKET_BUFFER_SIZE};

/// Why a session returned control to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd
{
    /// `c`: the target should run freely
    Resumed,
    /// `s`: the target should execute one instruction and trap again
    Stepped,
    /// The transport reached end of stream
    Disconnected,
}

/// Serve the debugger until it resumes or steps the target
///
/// Announces `state.signal` first, then handles packets one at a time. A
/// packet with a bad checksum is dropped (the debugger resends it after our
/// `-`) and an oversized one is answered with `E00`; neither ends the
/// session.
///
/// ## Errors
///
/// Transport failures other than a clean end of stream.
///
/// ## Example
///
/// ```rust
/// use dbgstub_core::arch::Mock;
/// use dbgstub_core::types::{DebugState, Signal};
/// use dbgstub_core::{BufferTransport, RamTarget};
/// use dbgstub_protocol::session::{run_session, SessionEnd};
///
/// let mut transport = BufferTransport::with_input(b"+$?#3f+$c#63");
/// let mut target = RamTarget::<Mock>::new(16);
/// let mut state = DebugState::<4>::new(Signal::TRAP);
///
/// let end = run_session(&mut transport, &mut target, &mut state).unwrap();
/// assert_eq!(end, SessionEnd::Resumed);
/// assert_eq!(transport.output(), b"$S05#b8+$S05#b8+");
/// ```
pub fn run_session<T, G, const N: usize>(
    transport: &mut T,
    target: &mut G,
    state: &mut DebugState<N>,
) -> PacketResult<SessionEnd>
where
    T: Transport,
    G: Target<N>,
{
    let mut packet = [0u8; PACKET_BUFFER_SIZE];
    let mut scratch = [0u8; PACKET_BUFFER_SIZE];

    debug!(signal = %state.signal, "session started");
    if let Some(end) = tolerate(send_signal_packet(transport, state.signal))? {
        return Ok(end);
    }

    loop {
        let len = match receive_packet(transport, &mut packet) {
            Ok(len) => len,
            Err(PacketError::Overflow { capacity }) => {
                debug!(capacity, "rejecting oversized packet");
                if let Some(end) = tolerate(send_error_packet(transport, ERROR_CODE))? {
                    return Ok(end);
                }
                continue;
            }
            Err(e) => {
                if let Some(end) = tolerate::<usize>(Err(e))? {
                    return Ok(end);
                }
                continue;
            }
        };

        let outcome = match dispatch(transport, target, state, &packet[..len], &mut scratch) {
            Ok(outcome) => outcome,
            Err(e) => tolerate::<()>(Err(e))?,
        };
        if let Some(end) = outcome {
            debug!(?end, "session finished");
            return Ok(end);
        }
    }
}

/// Sort a packet-level result into keep going, disconnected, or fatal
fn tolerate<A>(result: PacketResult<A>) -> PacketResult<Option<SessionEnd>>
{
    match result {
        Ok(_) => Ok(None),
        Err(PacketError::Transport(TransportError::Closed)) => {
            info!("debugger disconnected");
            Ok(Some(SessionEnd::Disconnected))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("{e}");
            Ok(None)
        }
    }
}

/// A transport and target that outlive individual sessions
///
/// ## Example
///
/// ```rust
/// use dbgstub_core::arch::Mock;
/// use dbgstub_core::types::{DebugState, Signal};
/// use dbgstub_core::{BufferTransport, RamTarget};
/// use dbgstub_protocol::session::{Session, SessionEnd};
///
/// let mut session = Session::new(BufferTransport::with_input(b"+$s#73+"), RamTarget::<Mock>::new(16));
/// let mut state = DebugState::<4>::new(Signal::TRAP);
///
/// assert_eq!(session.run(&mut state).unwrap(), SessionEnd::Stepped);
/// assert_eq!(session.run(&mut state).unwrap(), SessionEnd::Disconnected);
/// assert_eq!(session.entries(), 2);
/// ```
#[derive(Debug)]
pub struct Session<T, G>
{
    transport: T,
    target: G,
    entries: usize,
}

impl<T: Transport, G> Session<T, G>
{
    /// Bundle a transport and a target
    pub fn new(transport: T, target: G) -> Self
    {
        Self {
            transport,
            target,
            entries: 0,
        }
    }

    /// Run one session for a freshly trapped target
    ///
    /// ## Errors
    ///
    /// See [`run_session`].
    pub fn run<const N: usize>(&mut self, state: &mut DebugState<N>) -> PacketResult<SessionEnd>
    where
        G: Target<N>,
    {
        self.entries += 1;
        run_session(&mut self.transport, &mut self.target, state)
    }

    /// Print a line on the debugger's console
    ///
    /// ## Errors
    ///
    /// See [`send_console_message`]. An unacknowledged message is not an error.
    pub fn console(&mut self, message: &str) -> PacketResult<()>
    {
        let mut scratch = [0u8; PACKET_BUFFER_SIZE];
        send_console_message(&mut self.transport, &mut scratch, message).map(|_| ())
    }

    /// How many times [`Session::run`] has been entered
    #[must_use]
    pub fn entries(&self) -> usize
    {
        self.entries
    }

    /// The transport
    pub fn transport(&self) -> &T
    {
        &self.transport
    }

    /// The target
    pub fn target(&self) -> &G
    {
        &self.target
    }

    /// Split back into transport and target
    pub fn into_parts(self) -> (T, G)
    {
        (self.transport, self.target)
    }
}

#[cfg(test)]
mod tests
{
    use dbgstub_core::arch::{Mock, MOCK_REGISTER_COUNT};
    use dbgstub_core::types::Signal;
    use dbgstub_core::{BufferTransport, RamTarget};

    use super::*;

    fn run(input: &[u8]) -> (PacketResult<SessionEnd>, Vec<u8>)
    {
        let mut transport = BufferTransport::with_input(input);
        let mut target = RamTarget::<Mock>::new(16);
        let mut state = DebugState::<MOCK_REGISTER_COUNT>::new(Signal::TRAP);
        let end = run_session(&mut transport, &mut target, &mut state);
        (end, transport.take_output())
    }

    #[test]
    fn test_eof_before_any_packet_disconnects()
    {
        let (end, out) = run(b"+");
        assert_eq!(end.unwrap(), SessionEnd::Disconnected);
        assert_eq!(out, b"$S05#b8");
    }

    #[test]
    fn test_eof_while_waiting_for_announce_ack()
    {
        let (end, _) = run(b"");
        assert_eq!(end.unwrap(), SessionEnd::Disconnected);
    }

    #[test]
    fn test_bad_checksum_is_nacked_and_session_continues()
    {
        let (end, out) = run(b"+$?#00$c#63");
        assert_eq!(end.unwrap(), SessionEnd::Resumed);
        assert_eq!(out, b"$S05#b8-+");
    }

    #[test]
    fn test_empty_packet_gets_no_reply()
    {
        let (end, out) = run(b"+$#00$c#63");
        assert_eq!(end.unwrap(), SessionEnd::Resumed);
        assert_eq!(out, b"$S05#b8++");
    }

    #[test]
    fn test_oversized_packet_gets_error_reply()
    {
        let mut input = b"+$".to_vec();
        input.extend(std::iter::repeat(b'a').take(PACKET_BUFFER_SIZE + 1));
        input.extend_from_slice(b"#00+$c#63");

        let (end, out) = run(&input);
        assert_eq!(end.unwrap(), SessionEnd::Resumed);
        assert_eq!(out, b"$S05#b8+$E00#a5+");
    }

    #[test]
    fn test_session_reentry_counts()
    {
        let mut session = Session::new(BufferTransport::with_input(b"+$c#63+"), RamTarget::<Mock>::new(4));
        let mut state = DebugState::<MOCK_REGISTER_COUNT>::new(Signal::TRAP);

        assert_eq!(session.run(&mut state).unwrap(), SessionEnd::Resumed);
        state.signal = Signal::TRAP;
        assert_eq!(session.run(&mut state).unwrap(), SessionEnd::Disconnected);
        assert_eq!(session.entries(), 2);
        assert_eq!(session.target().resume_count(), 1);
        assert_eq!(session.transport().output(), b"$S05#b8+$S05#b8");
    }
}
