//! # Error Types
//!
//! Failures reported by the capability interfaces the protocol engine runs on.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::Address;

/// Failure of the byte stream the debugger talks over
///
/// Any transport failure is fatal to the current debug session: the session
/// loop stops and hands control back to the caller.
#[derive(Error, Debug)]
pub enum TransportError
{
    /// The byte source is exhausted (peer hung up, test buffer drained, EOF on stdin)
    #[error("Transport closed")]
    Closed,

    /// I/O error from the underlying reader or writer
    ///
    /// This wraps errors from sockets, serial devices or stdio.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a target memory or execution-control operation
///
/// These are local failures: the dispatcher turns them into an RSP error
/// packet and keeps the session alive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError
{
    /// The address is not backed by target memory
    #[error("Invalid address: {0}")]
    InvalidAddress(Address),

    /// The target cannot perform the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Umbrella error for host programs embedding the stub
#[derive(Error, Debug)]
pub enum StubError
{
    /// Byte stream failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Target failure
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Invalid configuration supplied by the host (bad image, bad sizes, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (for loading images, binding sockets, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, StubError>`
///
/// ```rust
/// use dbgstub_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, StubError>;

/// Result of a single transport operation
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Result of a single target operation
pub type TargetResult<T> = std::result::Result<T, TargetError>;
