//! Per-trap debug state shared between the caller and the protocol engine.

use super::Signal;

/// One machine word of the register file
///
/// Both supported architectures use 32-bit registers.
pub type Word = u32;

/// Size of a [`Word`] in the register image, in bytes
pub const WORD_SIZE: usize = std::mem::size_of::<Word>();

/// Visible state of one debugging session
///
/// Created by whoever caught the trap (an interrupt handler, or a host program
/// simulating one), passed by `&mut` into the session loop and handed back
/// when the debugger resumes the target. The protocol engine never keeps a
/// reference to it between calls.
///
/// `N` is the number of registers the architecture exposes, in the order GDB
/// expects them (see [`crate::arch`]).
///
/// ## Register image
///
/// `g`/`G`/`p`/`P` move the raw memory image of the register array over the
/// wire: each word little-endian, in declared order. [`DebugState::register_bytes`]
/// and [`DebugState::set_register_bytes`] produce and consume that image.
///
/// ## Example
///
/// ```rust
/// use dbgstub_core::types::{DebugState, Signal};
///
/// let mut state = DebugState::<4>::with_registers(Signal::TRAP, [1, 2, 3, 4]);
/// assert_eq!(state.register_bytes(0), Some([1, 0, 0, 0]));
///
/// state.set_register_bytes(3, [0, 0, 0, 0xff]);
/// assert_eq!(state.registers[3], 0xff00_0000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugState<const N: usize>
{
    /// Current stop reason, announced with an `S` packet
    pub signal: Signal,
    /// Register file in architecture order
    pub registers: [Word; N],
}

impl<const N: usize> DebugState<N>
{
    /// Number of registers in this state
    pub const REGISTER_COUNT: usize = N;

    /// Size of the full register image in bytes
    pub const IMAGE_SIZE: usize = N * WORD_SIZE;

    /// Create a state with every register zeroed
    pub const fn new(signal: Signal) -> Self
    {
        Self {
            signal,
            registers: [0; N],
        }
    }

    /// Create a state with an explicit register file
    pub const fn with_registers(signal: Signal, registers: [Word; N]) -> Self
    {
        Self { signal, registers }
    }

    /// Little-endian image of register `index`, or `None` when out of range
    pub fn register_bytes(&self, index: usize) -> Option<[u8; WORD_SIZE]>
    {
        self.registers.get(index).map(|value| value.to_le_bytes())
    }

    /// Overwrite register `index` from its little-endian image
    ///
    /// Returns `false` (and writes nothing) when `index` is out of range.
    pub fn set_register_bytes(&mut self, index: usize, bytes: [u8; WORD_SIZE]) -> bool
    {
        match self.registers.get_mut(index) {
            Some(slot) => {
                *slot = Word::from_le_bytes(bytes);
                true
            }
            None => false,
        }
    }
}

impl<const N: usize> Default for DebugState<N>
{
    fn default() -> Self
    {
        Self::new(Signal::default())
    }
}
