//! # Command Dispatch
//!
//! Executes one parsed [`Command`] against the target and sends the reply.
//!
//! ## Replies
//!
//! | Command | Success | Failure |
//! |---|---|---|
//! | `g` | hex register image | `E00` |
//! | `G` | `OK` | `E00`, registers untouched |
//! | `p` | hex register value | `E00` (also for an unknown register) |
//! | `P` | `OK` (an unknown register is silently ignored) | `E00` |
//! | `m` | hex memory contents | `E00` |
//! | `M` / `X` | `OK` | `E00`, possibly after a partial write |
//! | `c` / `s` | none; the session ends | `E00` |
//! | `?` | `Sxx` | |
//! | anything else | empty packet | |
//!
//! Every local failure (malformed arguments, bad encoding, oversized
//! transfer, faulting address) becomes the same `E00` reply and the session
//! keeps going. Only a failing transport is reported to the caller.

use dbgstub_core::error::TargetError;
use dbgstub_core::types::{Address, DebugState, Word, WORD_SIZE};
use dbgstub_core::{Target, Transport};
use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{decode_binary, decode_hex, encode_hex, CodecError};
use crate::command::{Command, CommandError, WriteEncoding};
use crate::packet::{
    send_empty_packet, send_error_packet, send_ok_packet, send_packet, send_signal_packet, Ack, PacketResult,
    Printable,
};
use crate::session::SessionEnd;
use crate::{ERROR_CODE, MAX_MEMORY_TRANSFER};

/// A command that could not be carried out
///
/// Never leaves this module as an error value: each one is answered with an
/// `E00` packet.
#[derive(Error, Debug)]
pub enum DispatchError
{
    /// Arguments did not parse
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Hex or binary data did not decode, or a reply did not fit
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The target refused a memory access or resume request
    #[error(transparent)]
    Target(#[from] TargetError),

    /// `p` named a register the architecture does not have
    #[error("Register {index} out of range (target has {count})")]
    RegisterOutOfRange
    {
        /// Requested register
        index: u64,
        /// Registers available
        count: usize,
    },

    /// `m`/`M`/`X` asked for more than one transfer's worth of memory
    #[error("Memory transfer of {length} bytes exceeds limit of {limit}")]
    TransferTooLong
    {
        /// Requested length
        length: u64,
        /// Largest allowed transfer
        limit: usize,
    },
}

/// What to send once a command has been executed
enum Reply
{
    /// `scratch[..len]`
    Payload(usize),
    Ok,
    Empty,
    Signal,
    Nothing,
    End(SessionEnd),
}

/// Parse and execute one packet payload, then reply to it
///
/// `scratch` receives the reply payload and must not overlap `payload`.
/// Returns `Some` when the debugger resumed or stepped the target, which ends
/// the session.
///
/// ## Errors
///
/// Only fatal transport failures; everything else is answered on the wire.
pub fn dispatch<T, G, const N: usize>(
    transport: &mut T,
    target: &mut G,
    state: &mut DebugState<N>,
    payload: &[u8],
    scratch: &mut [u8],
) -> PacketResult<Option<SessionEnd>>
where
    T: Transport,
    G: Target<N>,
{
    let reply = Command::parse(payload)
        .map_err(DispatchError::from)
        .and_then(|command| execute(command, target, state, scratch));

    let sent = match reply {
        Ok(Reply::Payload(len)) => send_packet(transport, &scratch[..len]),
        Ok(Reply::Ok) => send_ok_packet(transport),
        Ok(Reply::Empty) => send_empty_packet(transport),
        Ok(Reply::Signal) => send_signal_packet(transport, state.signal),
        Ok(Reply::Nothing) => return Ok(None),
        Ok(Reply::End(end)) => return Ok(Some(end)),
        Err(e) => {
            debug!("command {} failed: {e}", Printable(payload));
            send_error_packet(transport, ERROR_CODE)
        }
    };

    settle(sent).map(|()| None)
}

/// Swallow non-fatal send failures; the peer will ask again if it cares
fn settle(sent: PacketResult<Ack>) -> PacketResult<()>
{
    match sent {
        Ok(_) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("reply not delivered cleanly: {e}");
            Ok(())
        }
    }
}

fn execute<G, const N: usize>(
    command: Command<'_>,
    target: &mut G,
    state: &mut DebugState<N>,
    scratch: &mut [u8],
) -> Result<Reply, DispatchError>
where
    G: Target<N>,
{
    match command {
        Command::Empty => Ok(Reply::Nothing),
        Command::ReadRegisters => read_registers(state, scratch).map(Reply::Payload),
        Command::WriteRegisters { data } => write_registers(state, data).map(|()| Reply::Ok),
        Command::ReadRegister { index } => {
            let bytes = usize::try_from(index)
                .ok()
                .and_then(|i| state.register_bytes(i))
                .ok_or(DispatchError::RegisterOutOfRange { index, count: N })?;
            Ok(Reply::Payload(encode_hex(&bytes, scratch)?))
        }
        Command::WriteRegister { index, value } => {
            match usize::try_from(index).ok().filter(|&i| i < N) {
                Some(i) => {
                    let mut bytes = [0u8; WORD_SIZE];
                    decode_hex(value, &mut bytes)?;
                    state.set_register_bytes(i, bytes);
                }
                None => debug!(index, "ignoring write to unknown register"),
            }
            Ok(Reply::Ok)
        }
        Command::ReadMemory { addr, length } => {
            let mut data = [0u8; MAX_MEMORY_TRANSFER];
            let data = &mut data[..transfer_len(length)?];
            for (offset, slot) in (0u64..).zip(data.iter_mut()) {
                *slot = target.read_memory_byte(addr + offset)?;
            }
            Ok(Reply::Payload(encode_hex(data, scratch)?))
        }
        Command::WriteMemory {
            addr,
            length,
            data,
            encoding,
        } => {
            let mut decoded = [0u8; MAX_MEMORY_TRANSFER];
            let decoded = &mut decoded[..transfer_len(length)?];
            let len = match encoding {
                WriteEncoding::Hex => {
                    decode_hex(data, decoded)?;
                    decoded.len()
                }
                WriteEncoding::Binary => decode_binary(data, decoded)?,
            };
            write_memory(target, addr, &decoded[..len])?;
            Ok(Reply::Ok)
        }
        Command::Continue => {
            target.resume(state)?;
            Ok(Reply::End(SessionEnd::Resumed))
        }
        Command::Step => {
            target.single_step(state)?;
            Ok(Reply::End(SessionEnd::Stepped))
        }
        Command::QueryHaltReason => Ok(Reply::Signal),
        Command::Unsupported(letter) => {
            debug!("unsupported command '{}'", char::from(letter));
            Ok(Reply::Empty)
        }
    }
}

fn transfer_len(length: u64) -> Result<usize, DispatchError>
{
    usize::try_from(length)
        .ok()
        .filter(|&len| len <= MAX_MEMORY_TRANSFER)
        .ok_or(DispatchError::TransferTooLong {
            length,
            limit: MAX_MEMORY_TRANSFER,
        })
}

fn read_registers<const N: usize>(state: &DebugState<N>, scratch: &mut [u8]) -> Result<usize, DispatchError>
{
    let needed = DebugState::<N>::IMAGE_SIZE * 2;
    if scratch.len() < needed {
        return Err(CodecError::OutputTooSmall {
            needed,
            available: scratch.len(),
        }
        .into());
    }

    let mut pos = 0;
    for value in &state.registers {
        pos += encode_hex(&value.to_le_bytes(), &mut scratch[pos..])?;
    }
    Ok(pos)
}

/// Replace the whole register file; nothing changes unless every word decodes
fn write_registers<const N: usize>(state: &mut DebugState<N>, data: &[u8]) -> Result<(), DispatchError>
{
    let expected = DebugState::<N>::IMAGE_SIZE * 2;
    if data.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: data.len(),
        }
        .into());
    }

    let mut registers = state.registers;
    for (slot, text) in registers.iter_mut().zip(data.chunks_exact(WORD_SIZE * 2)) {
        let mut bytes = [0u8; WORD_SIZE];
        decode_hex(text, &mut bytes)?;
        *slot = Word::from_le_bytes(bytes);
    }
    state.registers = registers;
    Ok(())
}

/// Write byte by byte; a fault leaves the bytes before it written
fn write_memory<G, const N: usize>(target: &mut G, addr: Address, data: &[u8]) -> Result<(), DispatchError>
where
    G: Target<N>,
{
    for (offset, &byte) in (0u64..).zip(data) {
        target.write_memory_byte(addr + offset, byte)?;
    }
    Ok(())
}
