//! # Architectures
//!
//! Register layouts the stub knows how to describe.
//!
//! The protocol engine itself never looks at register meaning: it moves a
//! `[Word; N]` image around. What differs between architectures is how many
//! registers there are, what they are called (for logging and the CLI), and
//! how the CPU is told to single-step.
//!
//! - [`Mock`]: four anonymous registers, used for tests and the host demo
//! - [`I386`]: 32-bit x86 in GDB's `i386` register order

pub mod i386;
pub mod mock;

pub use i386::{I386Register, I386State, InterruptFrame, I386, I386_REGISTER_COUNT};
pub use mock::{Mock, MockState, MOCK_REGISTER_COUNT};

use crate::types::Word;

/// Static description of a target architecture
pub trait Architecture
{
    /// Short name used in logs and on the command line
    const NAME: &'static str;

    /// Number of registers in the `g` packet, in order
    const REGISTER_COUNT: usize;

    /// Human-readable name of register `index`
    fn register_name(index: usize) -> Option<&'static str>;

    /// Arm or disarm hardware single-stepping in the saved register file
    ///
    /// Called on the way out of a session: `true` for `s`, `false` for `c`.
    /// The default does nothing, for targets that step some other way.
    fn set_single_step(_registers: &mut [Word], _enabled: bool) {}
}
