//! # Transport
//!
//! The byte-stream half of the capability interface.
//!
//! The protocol engine only ever needs to move one byte at a time, and it
//! blocks until that byte has been moved. Anything that can do that (a UART,
//! a TCP socket, stdio, a test buffer) can carry a debug session.
//!
//! Two implementations ship with the crate:
//!
//! - [`BufferTransport`]: in-memory input queue and output log, for tests and
//!   for replaying captured sessions
//! - [`IoTransport`]: any `std::io::Read`/`Write` pair (TCP stream, stdin/stdout)

use std::collections::VecDeque;
use std::io::{self, BufReader, BufWriter, Read, Write};

use crate::error::{TransportError, TransportResult};

/// Blocking byte-oriented stream the debugger talks over
///
/// Implementations block until a byte is available. There is no timeout: the
/// target is halted while the stub runs, so nothing else could make progress
/// anyway.
pub trait Transport
{
    /// Read one byte, blocking until it arrives
    ///
    /// ## Errors
    ///
    /// - `Closed`: the stream has no more data
    /// - `Io`: the underlying device failed
    fn get_byte(&mut self) -> TransportResult<u8>;

    /// Write one byte
    ///
    /// ## Errors
    ///
    /// - `Closed`: the peer went away
    /// - `Io`: the underlying device failed
    fn put_byte(&mut self, byte: u8) -> TransportResult<()>;

    /// Write a sequence of bytes, stopping at the first failure
    fn write_all(&mut self, bytes: &[u8]) -> TransportResult<()>
    {
        for &byte in bytes {
            self.put_byte(byte)?;
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T
{
    fn get_byte(&mut self) -> TransportResult<u8>
    {
        (**self).get_byte()
    }

    fn put_byte(&mut self, byte: u8) -> TransportResult<()>
    {
        (**self).put_byte(byte)
    }
}

/// In-memory transport
///
/// Bytes queued with [`BufferTransport::push_input`] are handed out by
/// `get_byte` in order; once the queue is empty `get_byte` reports
/// [`TransportError::Closed`]. Everything written is appended to an output log.
///
/// ## Example
///
/// ```rust
/// use dbgstub_core::transport::{BufferTransport, Transport};
///
/// let mut transport = BufferTransport::with_input(b"+");
/// transport.put_byte(b'$').unwrap();
/// assert_eq!(transport.get_byte().unwrap(), b'+');
/// assert!(transport.get_byte().is_err());
/// assert_eq!(transport.output(), b"$");
/// ```
#[derive(Debug, Default, Clone)]
pub struct BufferTransport
{
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferTransport
{
    /// Create an empty transport
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Create a transport whose input is pre-filled with `input`
    #[must_use]
    pub fn with_input(input: &[u8]) -> Self
    {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    /// Queue more bytes for `get_byte`
    pub fn push_input(&mut self, bytes: &[u8])
    {
        self.input.extend(bytes.iter().copied());
    }

    /// Number of input bytes not yet consumed
    #[must_use]
    pub fn remaining_input(&self) -> usize
    {
        self.input.len()
    }

    /// Everything written so far
    #[must_use]
    pub fn output(&self) -> &[u8]
    {
        &self.output
    }

    /// Take the output log, leaving it empty
    pub fn take_output(&mut self) -> Vec<u8>
    {
        std::mem::take(&mut self.output)
    }
}

impl Transport for BufferTransport
{
    fn get_byte(&mut self) -> TransportResult<u8>
    {
        self.input.pop_front().ok_or(TransportError::Closed)
    }

    fn put_byte(&mut self, byte: u8) -> TransportResult<()>
    {
        self.output.push(byte);
        Ok(())
    }
}

/// Transport over a `std::io` reader/writer pair
///
/// Output is buffered and flushed right before every blocking read, so a
/// whole packet goes out in one write while the lock-step protocol still
/// never waits on bytes that are sitting in our own buffer.
///
/// ## Example
///
/// ```rust,no_run
/// use std::net::TcpListener;
///
/// use dbgstub_core::transport::IoTransport;
///
/// let listener = TcpListener::bind("127.0.0.1:1234")?;
/// let (stream, _) = listener.accept()?;
/// let transport = IoTransport::new(stream.try_clone()?, stream);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct IoTransport<R: Read, W: Write>
{
    reader: BufReader<R>,
    writer: BufWriter<W>,
}

impl<R: Read, W: Write> IoTransport<R, W>
{
    /// Wrap a reader and a writer
    pub fn new(reader: R, writer: W) -> Self
    {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        }
    }

    /// Flush pending output
    ///
    /// ## Errors
    ///
    /// Returns `Closed` if the peer has hung up, `Io` on any other writer failure.
    pub fn flush(&mut self) -> TransportResult<()>
    {
        self.writer.flush().map_err(hangup)
    }

    /// Unwrap into the underlying reader and writer, flushing first
    ///
    /// ## Errors
    ///
    /// Returns `Io` if the final flush fails.
    pub fn into_inner(mut self) -> TransportResult<(R, W)>
    {
        self.flush()?;
        let writer = self.writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        Ok((self.reader.into_inner(), writer))
    }
}

impl<R: Read, W: Write> Transport for IoTransport<R, W>
{
    fn get_byte(&mut self) -> TransportResult<u8>
    {
        self.flush()?;

        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(_) => return Ok(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(hangup(e)),
            }
        }
    }

    fn put_byte(&mut self, byte: u8) -> TransportResult<()>
    {
        self.writer.write_all(&[byte]).map_err(hangup)
    }
}

/// A peer that went away is a closed transport, not an I/O failure
fn hangup(error: io::Error) -> TransportError
{
    match error.kind() {
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            TransportError::Closed
        }
        _ => error.into(),
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_buffer_transport_reports_closed_when_drained()
    {
        let mut transport = BufferTransport::with_input(b"ab");
        assert_eq!(transport.get_byte().unwrap(), b'a');
        assert_eq!(transport.get_byte().unwrap(), b'b');
        assert!(matches!(transport.get_byte(), Err(TransportError::Closed)));
    }

    #[test]
    fn test_io_transport_flushes_before_read()
    {
        let mut transport = IoTransport::new(Cursor::new(b"+".to_vec()), Vec::new());
        transport.write_all(b"$#00").unwrap();
        assert_eq!(transport.get_byte().unwrap(), b'+');
        assert!(matches!(transport.get_byte(), Err(TransportError::Closed)));

        let (_, written) = transport.into_inner().unwrap();
        assert_eq!(written, b"$#00");
    }

    struct HungUp;

    impl Read for HungUp
    {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize>
        {
            Err(io::ErrorKind::ConnectionReset.into())
        }
    }

    impl Write for HungUp
    {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize>
        {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()>
        {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn test_io_transport_broken_pipe_is_closed()
    {
        let mut transport = IoTransport::new(Cursor::new(b"+".to_vec()), HungUp);
        transport.write_all(b"$#00").unwrap();
        assert!(matches!(transport.get_byte(), Err(TransportError::Closed)));
        assert!(matches!(transport.flush(), Err(TransportError::Closed)));
    }

    #[test]
    fn test_io_transport_connection_reset_is_closed()
    {
        let mut transport = IoTransport::new(HungUp, Vec::new());
        assert!(matches!(transport.get_byte(), Err(TransportError::Closed)));
    }

    #[test]
    fn test_io_transport_other_errors_stay_io()
    {
        struct Denied;

        impl Write for Denied
        {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize>
            {
                Err(io::ErrorKind::PermissionDenied.into())
            }

            fn flush(&mut self) -> io::Result<()>
            {
                Ok(())
            }
        }

        let mut transport = IoTransport::new(Cursor::new(Vec::new()), Denied);
        transport.put_byte(b'$').unwrap();
        assert!(matches!(transport.flush(), Err(TransportError::Io(_))));
    }
}
