//! # Codec
//!
//! Conversions between RSP wire text and raw bytes.
//!
//! - **hex**: every byte becomes two lowercase hex digits, high nibble first
//! - **binary**: bytes pass through unchanged, except the four bytes that
//!   mean something to the framing layer (`$`, `#`, `}`, `*`), which are sent
//!   as `}` followed by the byte XOR `0x20`
//!
//! Every function writes into a caller-provided buffer and fails rather than
//! truncate when that buffer is too small: packet buffers have a fixed
//! capacity and overrunning them is never acceptable.

use thiserror::Error;

/// Hex digits used on the wire
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Escape byte of the binary encoding
pub const ESCAPE: u8 = b'}';

/// XOR mask applied to escaped bytes
pub const ESCAPE_MASK: u8 = 0x20;

/// Codec failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError
{
    /// The output buffer cannot hold the result
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall
    {
        /// Bytes required (a lower bound for the binary encodings)
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Hex text is not exactly twice the expected byte count
    #[error("Hex length mismatch: expected {expected} digits, got {actual}")]
    LengthMismatch
    {
        /// Expected number of hex digits
        expected: usize,
        /// Number of hex digits supplied
        actual: usize,
    },

    /// A byte that should have been a hex digit was not
    #[error("Invalid hex digit 0x{byte:02x} at offset {position}")]
    InvalidDigit
    {
        /// Offending byte
        byte: u8,
        /// Offset of the byte in the input
        position: usize,
    },

    /// Binary data ends with an escape byte and nothing to escape
    #[error("Escape byte at end of binary data")]
    TruncatedEscape,
}

/// Result of a codec operation
pub type CodecResult<T> = Result<T, CodecError>;

/// Value of the digit `ch` in `base` (2 to 16)
///
/// Accepts both cases for the letters. Returns `None` if `ch` is not a digit
/// or its value is not below `base`.
///
/// ```rust
/// use dbgstub_protocol::codec::digit_value;
///
/// assert_eq!(digit_value(b'F', 16), Some(15));
/// assert_eq!(digit_value(b'9', 8), None);
/// ```
#[must_use]
pub fn digit_value(ch: u8, base: u32) -> Option<u8>
{
    let value = match ch {
        b'0'..=b'9' => ch - b'0',
        b'a'..=b'f' => ch - b'a' + 0xa,
        b'A'..=b'F' => ch - b'A' + 0xa,
        _ => return None,
    };

    (u32::from(value) < base).then_some(value)
}

/// Lowercase hex digit for a nibble value, or `None` above `0xf`
#[must_use]
pub fn digit_char(value: u8) -> Option<u8>
{
    HEX_DIGITS.get(usize::from(value)).copied()
}

/// Hex-encode `data` into `out`, returning the number of bytes written
///
/// ## Errors
///
/// `OutputTooSmall` if `out` is shorter than `2 * data.len()`.
///
/// ```rust
/// use dbgstub_protocol::codec::encode_hex;
///
/// let mut out = [0u8; 4];
/// assert_eq!(encode_hex(&[0xab, 0x01], &mut out), Ok(4));
/// assert_eq!(&out, b"ab01");
/// ```
pub fn encode_hex(data: &[u8], out: &mut [u8]) -> CodecResult<usize>
{
    let needed = data.len() * 2;
    if out.len() < needed {
        return Err(CodecError::OutputTooSmall {
            needed,
            available: out.len(),
        });
    }

    for (byte, pair) in data.iter().zip(out.chunks_exact_mut(2)) {
        pair[0] = HEX_DIGITS[usize::from(byte >> 4)];
        pair[1] = HEX_DIGITS[usize::from(byte & 0xf)];
    }

    Ok(needed)
}

/// Decode hex `text` into exactly `out.len()` bytes
///
/// ## Errors
///
/// - `LengthMismatch` unless `text.len() == 2 * out.len()`
/// - `InvalidDigit` on the first non-hex character
pub fn decode_hex(text: &[u8], out: &mut [u8]) -> CodecResult<()>
{
    let expected = out.len() * 2;
    if text.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: text.len(),
        });
    }

    let nibble = |position: usize| {
        let byte = text[position];
        digit_value(byte, 16).ok_or(CodecError::InvalidDigit { byte, position })
    };

    for (index, slot) in out.iter_mut().enumerate() {
        let high = nibble(index * 2)?;
        let low = nibble(index * 2 + 1)?;
        *slot = (high << 4) | low;
    }

    Ok(())
}

/// True for the bytes the binary encoding must escape
#[must_use]
pub const fn needs_escape(byte: u8) -> bool
{
    matches!(byte, b'$' | b'#' | b'}' | b'*')
}

/// Binary-encode `data` into `out`, returning the number of bytes written
///
/// ## Errors
///
/// `OutputTooSmall` as soon as the next (possibly escaped) byte does not fit.
pub fn encode_binary(data: &[u8], out: &mut [u8]) -> CodecResult<usize>
{
    let mut pos = 0;

    for &byte in data {
        let width = if needs_escape(byte) { 2 } else { 1 };
        if pos + width > out.len() {
            return Err(CodecError::OutputTooSmall {
                needed: pos + width,
                available: out.len(),
            });
        }

        if width == 2 {
            out[pos] = ESCAPE;
            out[pos + 1] = byte ^ ESCAPE_MASK;
        } else {
            out[pos] = byte;
        }
        pos += width;
    }

    Ok(pos)
}

/// Decode binary `text` into `out`, returning the number of bytes decoded
///
/// ## Errors
///
/// - `OutputTooSmall` if the decoded data does not fit in `out`
/// - `TruncatedEscape` if `text` ends with a lone escape byte
pub fn decode_binary(text: &[u8], out: &mut [u8]) -> CodecResult<usize>
{
    let mut written = 0;
    let mut bytes = text.iter().copied();

    while let Some(byte) = bytes.next() {
        if written >= out.len() {
            return Err(CodecError::OutputTooSmall {
                needed: written + 1,
                available: out.len(),
            });
        }

        out[written] = if byte == ESCAPE {
            bytes.next().ok_or(CodecError::TruncatedEscape)? ^ ESCAPE_MASK
        } else {
            byte
        };
        written += 1;
    }

    Ok(written)
}

/// Integer parsed out of command text by [`parse_integer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInteger
{
    /// Parsed value, sign applied, wrapping on overflow
    pub value: i64,
    /// Bytes of the input consumed, including sign and `0x` prefix
    pub consumed: usize,
}

/// Parse an integer at the start of `text`, `strtol`-style
///
/// Grammar: optional `+`/`-`, optional `0x`/`0X` (which forces base 16 and is
/// only recognised when something follows it), then digits in `base`. A base
/// of 0 means 10. Parsing stops at the first byte that is not a digit of the
/// base, at a NUL byte, or at the end of `text`.
///
/// Returns `None` when no digit was consumed. That is the only failure
/// signal: `Some` with a value of 0 is a successful parse of `"0"`.
///
/// ```rust
/// use dbgstub_protocol::codec::parse_integer;
///
/// let parsed = parse_integer(b"1f,4", 16).unwrap();
/// assert_eq!((parsed.value, parsed.consumed), (0x1f, 2));
///
/// assert_eq!(parse_integer(b",4", 16), None);
/// assert_eq!(parse_integer(b"0", 16).unwrap().value, 0);
/// ```
#[must_use]
pub fn parse_integer(text: &[u8], base: u32) -> Option<ParsedInteger>
{
    let mut pos = 0;
    let mut negative = false;
    let mut base = base;

    match text.first() {
        Some(b'-') => {
            negative = true;
            pos += 1;
        }
        Some(b'+') => pos += 1,
        _ => {}
    }

    if pos + 2 < text.len() && text[pos] == b'0' && matches!(text[pos + 1], b'x' | b'X') {
        base = 16;
        pos += 2;
    }

    if base == 0 {
        base = 10;
    }

    let mut value: i64 = 0;
    let mut digits = 0;
    while let Some(&ch) = text.get(pos) {
        if ch == 0 {
            break;
        }
        let Some(digit) = digit_value(ch, base) else {
            break;
        };
        value = value.wrapping_mul(i64::from(base)).wrapping_add(i64::from(digit));
        digits += 1;
        pos += 1;
    }

    if digits == 0 {
        return None;
    }

    Some(ParsedInteger {
        value: if negative { value.wrapping_neg() } else { value },
        consumed: pos,
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_digit_helpers()
    {
        assert_eq!(digit_value(b'1', 2), Some(1));
        assert_eq!(digit_value(b'2', 2), None);
        assert_eq!(digit_value(b'g', 16), None);
        assert_eq!(digit_char(0xa), Some(b'a'));
        assert_eq!(digit_char(0x10), None);
    }

    #[test]
    fn test_encode_hex_rejects_short_output()
    {
        let mut out = [0u8; 3];
        assert_eq!(
            encode_hex(&[1, 2], &mut out),
            Err(CodecError::OutputTooSmall { needed: 4, available: 3 })
        );
    }

    #[test]
    fn test_decode_hex_accepts_both_cases()
    {
        let mut out = [0u8; 2];
        decode_hex(b"aBFf", &mut out).unwrap();
        assert_eq!(out, [0xab, 0xff]);
    }

    #[test]
    fn test_decode_hex_rejects_wrong_length_and_junk()
    {
        let mut out = [0u8; 2];
        assert_eq!(
            decode_hex(b"abc", &mut out),
            Err(CodecError::LengthMismatch { expected: 4, actual: 3 })
        );
        assert_eq!(
            decode_hex(b"ab0z", &mut out),
            Err(CodecError::InvalidDigit { byte: b'z', position: 3 })
        );
    }

    #[test]
    fn test_encode_binary_escapes_framing_bytes()
    {
        let mut out = [0u8; 16];
        let len = encode_binary(b"a$#}*b", &mut out).unwrap();
        assert_eq!(&out[..len], b"a}\x04}\x03}]}\x0ab");
    }

    #[test]
    fn test_encode_binary_overflow_on_escape()
    {
        let mut out = [0u8; 2];
        assert!(encode_binary(b"a$", &mut out).is_err());
    }

    #[test]
    fn test_decode_binary_truncated_escape()
    {
        let mut out = [0u8; 4];
        assert_eq!(decode_binary(b"ab}", &mut out), Err(CodecError::TruncatedEscape));
    }

    #[test]
    fn test_decode_binary_output_overflow()
    {
        let mut out = [0u8; 2];
        assert!(matches!(
            decode_binary(b"abc", &mut out),
            Err(CodecError::OutputTooSmall { .. })
        ));
    }

    #[test]
    fn test_parse_integer_sign_and_prefix()
    {
        assert_eq!(
            parse_integer(b"-0x10", 0),
            Some(ParsedInteger { value: -16, consumed: 5 })
        );
        assert_eq!(parse_integer(b"+42", 0), Some(ParsedInteger { value: 42, consumed: 3 }));
        assert_eq!(parse_integer(b"0X1f", 10), Some(ParsedInteger { value: 31, consumed: 4 }));
    }

    #[test]
    fn test_parse_integer_bare_prefix_is_zero()
    {
        // "0x" with nothing after it parses the 0 and stops at the x
        assert_eq!(parse_integer(b"0x", 16), Some(ParsedInteger { value: 0, consumed: 1 }));
    }

    #[test]
    fn test_parse_integer_stops_at_nul_and_non_digit()
    {
        assert_eq!(parse_integer(b"12\x0034", 10), Some(ParsedInteger { value: 12, consumed: 2 }));
        assert_eq!(parse_integer(b"7=", 16), Some(ParsedInteger { value: 7, consumed: 1 }));
    }

    #[test]
    fn test_parse_integer_no_digits()
    {
        assert_eq!(parse_integer(b"", 16), None);
        assert_eq!(parse_integer(b"-", 16), None);
        assert_eq!(parse_integer(b"xyz", 16), None);
    }
}
