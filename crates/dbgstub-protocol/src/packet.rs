//! # Packet Transport
//!
//! Framing of RSP packets over a [`Transport`]:
//!
//! ```text
//! $<payload>#<checksum>
//! ```
//!
//! `checksum` is two lowercase hex digits of the payload's byte sum modulo 256.
//! Every packet is acknowledged with a single `+` (accepted) or `-` (rejected,
//! please resend). The protocol is lock-step: at most one packet is ever
//! waiting for its acknowledgment, and this layer never retries on its own.

use std::fmt;

use dbgstub_core::error::TransportError;
use dbgstub_core::types::Signal;
use dbgstub_core::Transport;
use thiserror::Error;
use tracing::{trace, warn};

use crate::codec::{decode_hex, encode_hex, CodecError};

/// Start-of-packet marker
pub const PACKET_START: u8 = b'$';
/// End-of-payload marker
pub const PACKET_END: u8 = b'#';
/// Positive acknowledgment
pub const ACK: u8 = b'+';
/// Negative acknowledgment
pub const NACK: u8 = b'-';

/// How the peer answered a packet we sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack
{
    /// `+`: packet accepted
    Ack,
    /// `-`: packet rejected; resending is the caller's business
    Nack,
}

/// Failure to send or receive a packet
#[derive(Error, Debug)]
pub enum PacketError
{
    /// The byte stream failed or closed
    ///
    /// This is the only fatal variant: the session cannot continue.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Payload longer than the receive buffer
    #[error("Packet exceeds buffer capacity of {capacity} bytes")]
    Overflow
    {
        /// Capacity of the receive buffer
        capacity: usize,
    },

    /// Checksum digits do not match the payload (a `-` has been sent)
    #[error("Checksum mismatch: packet says {expected:02x}, payload sums to {computed:02x}")]
    ChecksumMismatch
    {
        /// Checksum carried by the packet
        expected: u8,
        /// Checksum computed over the received payload
        computed: u8,
    },

    /// Checksum field is not two hex digits (a `-` has been sent)
    #[error("Malformed checksum digits {:?}", Printable(&.0[..]))]
    MalformedChecksum([u8; 2]),

    /// Peer answered a packet with something other than `+` or `-`
    #[error("Unexpected acknowledgment byte 0x{0:02x}")]
    UnexpectedAck(u8),

    /// Packet could not be encoded into the scratch buffer
    #[error("Encoding error: {0}")]
    Codec(#[from] CodecError),
}

impl PacketError
{
    /// True if the session must end
    #[must_use]
    pub fn is_fatal(&self) -> bool
    {
        matches!(self, Self::Transport(_))
    }
}

/// Result of a packet operation
pub type PacketResult<T> = Result<T, PacketError>;

/// 8-bit checksum of a payload: the byte sum modulo 256
///
/// ```rust
/// use dbgstub_protocol::packet::checksum;
///
/// assert_eq!(checksum(b"OK"), 0x9a);
/// assert_eq!(checksum(b""), 0);
/// ```
#[must_use]
pub fn checksum(payload: &[u8]) -> u8
{
    payload.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Send `payload` as one packet and wait for its acknowledgment
///
/// ## Errors
///
/// - `Transport` if any byte cannot be written or the ack cannot be read
/// - `UnexpectedAck` if the peer answers with anything but `+`/`-`
pub fn send_packet<T: Transport>(transport: &mut T, payload: &[u8]) -> PacketResult<Ack>
{
    trace!("-> {}", Printable(payload));

    transport.put_byte(PACKET_START)?;
    transport.write_all(payload)?;

    let mut trailer = [PACKET_END, 0, 0];
    encode_hex(&[checksum(payload)], &mut trailer[1..])?;
    transport.write_all(&trailer)?;

    receive_ack(transport)
}

/// Read the single acknowledgment byte that follows a sent packet
///
/// ## Errors
///
/// - `Transport` if the byte cannot be read
/// - `UnexpectedAck` for anything but `+`/`-`
pub fn receive_ack<T: Transport>(transport: &mut T) -> PacketResult<Ack>
{
    match transport.get_byte()? {
        ACK => Ok(Ack::Ack),
        NACK => {
            warn!("packet not acknowledged by peer");
            Ok(Ack::Nack)
        }
        other => {
            warn!("received bad packet response: 0x{other:02x}");
            Err(PacketError::UnexpectedAck(other))
        }
    }
}

/// Receive one packet into `buf`, returning the payload length
///
/// Bytes before the next `$` are discarded, which resynchronises the stream
/// after line noise or a half-received packet. The payload must fit in `buf`;
/// a longer payload is read to its end, acknowledged so the peer does not
/// resend it, and rejected, never truncated. A correct checksum is
/// acknowledged with `+`, a wrong or unreadable one with `-`.
///
/// ## Errors
///
/// - `Transport` if the stream ends or fails anywhere in the packet
/// - `Overflow` if the payload does not fit in `buf`
/// - `ChecksumMismatch` / `MalformedChecksum` after sending `-`
pub fn receive_packet<T: Transport>(transport: &mut T, buf: &mut [u8]) -> PacketResult<usize>
{
    let mut discarded = 0usize;
    while transport.get_byte()? != PACKET_START {
        discarded += 1;
    }
    if discarded > 0 {
        trace!(discarded, "skipped bytes before packet start");
    }

    let mut len = 0;
    loop {
        let byte = transport.get_byte()?;
        if byte == PACKET_END {
            break;
        }

        let Some(slot) = buf.get_mut(len) else {
            warn!("packet buffer overflow");
            skip_packet_tail(transport)?;
            transport.put_byte(ACK)?;
            return Err(PacketError::Overflow { capacity: buf.len() });
        };
        *slot = byte;
        len += 1;
    }

    let payload = &buf[..len];
    trace!("<- {}", Printable(payload));

    let digits = [transport.get_byte()?, transport.get_byte()?];
    let computed = checksum(payload);

    let mut expected = [0u8];
    if decode_hex(&digits, &mut expected).is_err() {
        warn!("received packet with malformed checksum");
        transport.put_byte(NACK)?;
        return Err(PacketError::MalformedChecksum(digits));
    }

    if expected[0] != computed {
        warn!("received packet with bad checksum");
        transport.put_byte(NACK)?;
        return Err(PacketError::ChecksumMismatch {
            expected: expected[0],
            computed,
        });
    }

    transport.put_byte(ACK)?;
    Ok(len)
}

/// Consume the rest of a packet we are not going to store, checksum included
fn skip_packet_tail<T: Transport>(transport: &mut T) -> PacketResult<()>
{
    while transport.get_byte()? != PACKET_END {}
    transport.get_byte()?;
    transport.get_byte()?;
    Ok(())
}

/// Send `OK`
///
/// ## Errors
///
/// See [`send_packet`].
pub fn send_ok_packet<T: Transport>(transport: &mut T) -> PacketResult<Ack>
{
    send_packet(transport, b"OK")
}

/// Send the empty packet (`$#00`), the reply to unsupported commands
///
/// ## Errors
///
/// See [`send_packet`].
pub fn send_empty_packet<T: Transport>(transport: &mut T) -> PacketResult<Ack>
{
    send_packet(transport, b"")
}

/// Send a stop announcement, `S` followed by the signal number in hex
///
/// ## Errors
///
/// See [`send_packet`].
pub fn send_signal_packet<T: Transport>(transport: &mut T, signal: Signal) -> PacketResult<Ack>
{
    send_tagged_byte(transport, b'S', signal.number())
}

/// Send an error reply, `E` followed by the error code in hex
///
/// ## Errors
///
/// See [`send_packet`].
pub fn send_error_packet<T: Transport>(transport: &mut T, code: u8) -> PacketResult<Ack>
{
    send_tagged_byte(transport, b'E', code)
}

/// Print `message` on the debugger's console (`O` followed by the hex text)
///
/// `scratch` holds the encoded packet; it must fit `1 + 2 * message.len()` bytes.
///
/// ## Errors
///
/// - `Codec` if the message does not fit in `scratch`
/// - otherwise see [`send_packet`]
pub fn send_console_message<T: Transport>(
    transport: &mut T,
    scratch: &mut [u8],
    message: &str,
) -> PacketResult<Ack>
{
    let Some((tag, body)) = scratch.split_first_mut() else {
        return Err(CodecError::OutputTooSmall {
            needed: 1 + message.len() * 2,
            available: 0,
        }
        .into());
    };
    *tag = b'O';
    let len = encode_hex(message.as_bytes(), body)?;
    send_packet(transport, &scratch[..=len])
}

fn send_tagged_byte<T: Transport>(transport: &mut T, tag: u8, value: u8) -> PacketResult<Ack>
{
    let mut payload = [tag, 0, 0];
    encode_hex(&[value], &mut payload[1..])?;
    send_packet(transport, &payload)
}

/// Displays packet bytes for logs, escaping anything non-printable as `\xNN`
pub struct Printable<'a>(pub &'a [u8]);

impl fmt::Display for Printable<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for &byte in self.0 {
            if (0x20..=0x7e).contains(&byte) {
                write!(f, "{}", char::from(byte))?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Printable<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "\"{self}\"")
    }
}
