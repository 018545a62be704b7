//! Stop signal reported to the debugger.

use std::fmt;

/// Why the target halted, as a GDB signal number
///
/// GDB numbers signals the way classic Unix does (`SIGTRAP` = 5 and so on)
/// regardless of the host it runs on. The stub reports the number verbatim in
/// `S` packets, so only the low 8 bits are meaningful.
///
/// ## Example
///
/// ```rust
/// use dbgstub_core::types::Signal;
///
/// assert_eq!(Signal::TRAP.number(), 5);
/// assert_eq!(Signal::from(11).to_string(), "SIGSEGV");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(u8);

impl Signal
{
    /// Illegal instruction
    pub const ILL: Self = Signal(4);
    /// Trace/breakpoint trap (single-step and `int3` land here)
    pub const TRAP: Self = Signal(5);
    /// Emulation trap, used for any CPU exception without a better mapping
    pub const EMT: Self = Signal(7);
    /// Segmentation fault
    pub const SEGV: Self = Signal(11);

    /// Create a signal from its GDB number
    pub const fn new(number: u8) -> Self
    {
        Signal(number)
    }

    /// The raw GDB signal number
    pub const fn number(self) -> u8
    {
        self.0
    }

    /// Conventional name for the well-known signals
    pub const fn name(self) -> Option<&'static str>
    {
        match self.0 {
            4 => Some("SIGILL"),
            5 => Some("SIGTRAP"),
            7 => Some("SIGEMT"),
            11 => Some("SIGSEGV"),
            _ => None,
        }
    }
}

impl Default for Signal
{
    fn default() -> Self
    {
        Signal::TRAP
    }
}

impl From<u8> for Signal
{
    fn from(number: u8) -> Self
    {
        Signal(number)
    }
}

impl From<Signal> for u8
{
    fn from(signal: Signal) -> Self
    {
        signal.0
    }
}

impl fmt::Display for Signal
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "signal {}", self.0),
        }
    }
}
