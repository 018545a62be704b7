//! # Commands
//!
//! Parsing of a received payload into a [`Command`].
//!
//! Only the classic single-letter commands are understood:
//!
//! | Packet | Meaning |
//! |---|---|
//! | `g` | read all registers |
//! | `G XX..` | write all registers |
//! | `p n` | read register `n` |
//! | `P n=r..` | write register `n` |
//! | `m addr,length` | read memory |
//! | `M addr,length:XX..` | write memory, hex payload |
//! | `X addr,length:bb..` | write memory, binary payload |
//! | `c [addr]` | continue |
//! | `s [addr]` | single-step |
//! | `?` | report the stop reason |
//!
//! Arguments are hex integers read strictly left to right; the first missing
//! separator or unparseable integer rejects the whole packet. Anything after
//! the arguments a command needs is ignored (GDB's optional resume address
//! included).

use dbgstub_core::types::Address;
use thiserror::Error;

use crate::codec::parse_integer;

/// Payload encoding of a memory write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEncoding
{
    /// `M`: two hex digits per byte
    Hex,
    /// `X`: raw bytes with `}` escapes
    Binary,
}

/// A parsed RSP command, borrowing its data from the packet buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a>
{
    /// Empty packet; ignored without a reply
    Empty,
    /// `g`
    ReadRegisters,
    /// `G`, with the hex register image
    WriteRegisters
    {
        /// Hex text following the command letter
        data: &'a [u8],
    },
    /// `p`
    ReadRegister
    {
        /// Register number as sent (not yet range-checked)
        index: u64,
    },
    /// `P`
    WriteRegister
    {
        /// Register number as sent (not yet range-checked)
        index: u64,
        /// Hex text after the `=`
        value: &'a [u8],
    },
    /// `m`
    ReadMemory
    {
        /// First address to read
        addr: Address,
        /// Number of bytes requested (not yet bounded)
        length: u64,
    },
    /// `M` or `X`
    WriteMemory
    {
        /// First address to write
        addr: Address,
        /// Number of bytes announced (not yet bounded)
        length: u64,
        /// Encoded data after the `:`
        data: &'a [u8],
        /// How `data` is encoded
        encoding: WriteEncoding,
    },
    /// `c`
    Continue,
    /// `s`
    Step,
    /// `?`
    QueryHaltReason,
    /// Any other command letter; answered with an empty packet
    Unsupported(u8),
}

/// Malformed command arguments
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError
{
    /// No hex integer where one was required
    #[error("Expected integer at offset {offset}")]
    ExpectedInteger
    {
        /// Offset into the payload
        offset: usize,
    },

    /// A separator (`,` `:` `=`) was missing
    #[error("Expected '{expected}' at offset {offset}")]
    ExpectedSeparator
    {
        /// Separator that should have been there
        expected: char,
        /// Offset into the payload
        offset: usize,
    },
}

impl<'a> Command<'a>
{
    /// Parse a packet payload
    ///
    /// ## Errors
    ///
    /// `ExpectedInteger` / `ExpectedSeparator` at the first argument that does
    /// not match the command's grammar.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use dbgstub_core::types::Address;
    /// use dbgstub_protocol::command::Command;
    ///
    /// let cmd = Command::parse(b"m1000,10").unwrap();
    /// assert_eq!(cmd, Command::ReadMemory { addr: Address::new(0x1000), length: 0x10 });
    ///
    /// assert!(Command::parse(b"m1000").is_err());
    /// ```
    pub fn parse(payload: &'a [u8]) -> Result<Self, CommandError>
    {
        let Some((&letter, _)) = payload.split_first() else {
            return Ok(Self::Empty);
        };

        let mut cursor = Cursor::new(payload);
        cursor.skip(1);

        let command = match letter {
            b'g' => Self::ReadRegisters,
            b'G' => Self::WriteRegisters { data: cursor.rest() },
            b'p' => Self::ReadRegister {
                index: cursor.expect_integer()?,
            },
            b'P' => {
                let index = cursor.expect_integer()?;
                cursor.expect_separator(b'=')?;
                Self::WriteRegister {
                    index,
                    value: cursor.rest(),
                }
            }
            b'm' => {
                let addr = Address::new(cursor.expect_integer()?);
                cursor.expect_separator(b',')?;
                let length = cursor.expect_integer()?;
                Self::ReadMemory { addr, length }
            }
            b'M' | b'X' => {
                let addr = Address::new(cursor.expect_integer()?);
                cursor.expect_separator(b',')?;
                let length = cursor.expect_integer()?;
                cursor.expect_separator(b':')?;
                Self::WriteMemory {
                    addr,
                    length,
                    data: cursor.rest(),
                    encoding: if letter == b'M' {
                        WriteEncoding::Hex
                    } else {
                        WriteEncoding::Binary
                    },
                }
            }
            b'c' => Self::Continue,
            b's' => Self::Step,
            b'?' => Self::QueryHaltReason,
            other => Self::Unsupported(other),
        };

        Ok(command)
    }
}

/// Left-to-right reader over a command payload
#[derive(Debug)]
struct Cursor<'a>
{
    payload: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a>
{
    fn new(payload: &'a [u8]) -> Self
    {
        Self { payload, pos: 0 }
    }

    fn skip(&mut self, count: usize)
    {
        self.pos = (self.pos + count).min(self.payload.len());
    }

    fn rest(&self) -> &'a [u8]
    {
        &self.payload[self.pos..]
    }

    /// Hex integer at the cursor, reinterpreted as unsigned (a leading `-` wraps)
    #[allow(clippy::cast_sign_loss)]
    fn expect_integer(&mut self) -> Result<u64, CommandError>
    {
        let parsed = parse_integer(self.rest(), 16).ok_or(CommandError::ExpectedInteger { offset: self.pos })?;
        self.pos += parsed.consumed;
        Ok(parsed.value as u64)
    }

    fn expect_separator(&mut self, expected: u8) -> Result<(), CommandError>
    {
        if self.rest().first() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CommandError::ExpectedSeparator {
                expected: char::from(expected),
                offset: self.pos,
            })
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_simple_letters()
    {
        assert_eq!(Command::parse(b"").unwrap(), Command::Empty);
        assert_eq!(Command::parse(b"g").unwrap(), Command::ReadRegisters);
        assert_eq!(Command::parse(b"c").unwrap(), Command::Continue);
        assert_eq!(Command::parse(b"c1000").unwrap(), Command::Continue);
        assert_eq!(Command::parse(b"s").unwrap(), Command::Step);
        assert_eq!(Command::parse(b"?").unwrap(), Command::QueryHaltReason);
        assert_eq!(Command::parse(b"qSupported").unwrap(), Command::Unsupported(b'q'));
    }

    #[test]
    fn test_parse_register_commands()
    {
        assert_eq!(Command::parse(b"G0102").unwrap(), Command::WriteRegisters { data: b"0102" });
        assert_eq!(Command::parse(b"pa").unwrap(), Command::ReadRegister { index: 10 });
        assert_eq!(
            Command::parse(b"P3=000000ff").unwrap(),
            Command::WriteRegister {
                index: 3,
                value: b"000000ff"
            }
        );
    }

    #[test]
    fn test_parse_memory_commands()
    {
        assert_eq!(
            Command::parse(b"M10,2:abcd").unwrap(),
            Command::WriteMemory {
                addr: Address::new(0x10),
                length: 2,
                data: b"abcd",
                encoding: WriteEncoding::Hex,
            }
        );
        assert_eq!(
            Command::parse(b"X0,3:ABC").unwrap(),
            Command::WriteMemory {
                addr: Address::ZERO,
                length: 3,
                data: b"ABC",
                encoding: WriteEncoding::Binary,
            }
        );
    }

    #[test]
    fn test_parse_errors_report_offset()
    {
        assert_eq!(Command::parse(b"p"), Err(CommandError::ExpectedInteger { offset: 1 }));
        assert_eq!(
            Command::parse(b"P3:00"),
            Err(CommandError::ExpectedSeparator { expected: '=', offset: 2 })
        );
        assert_eq!(
            Command::parse(b"m0 4"),
            Err(CommandError::ExpectedSeparator { expected: ',', offset: 2 })
        );
        assert_eq!(Command::parse(b"M0,:00"), Err(CommandError::ExpectedInteger { offset: 3 }));
        assert_eq!(
            Command::parse(b"X0,1"),
            Err(CommandError::ExpectedSeparator { expected: ':', offset: 4 })
        );
    }

    #[test]
    fn test_negative_length_wraps()
    {
        assert_eq!(
            Command::parse(b"m0,-1").unwrap(),
            Command::ReadMemory {
                addr: Address::ZERO,
                length: u64::MAX
            }
        );
    }
}
