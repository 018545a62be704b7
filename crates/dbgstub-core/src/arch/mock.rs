//! Four-register mock architecture.

use super::Architecture;
use crate::types::DebugState;

/// Number of registers exposed by [`Mock`]
pub const MOCK_REGISTER_COUNT: usize = 4;

/// Debug state for the mock architecture
pub type MockState = DebugState<MOCK_REGISTER_COUNT>;

/// A minimal architecture with four 32-bit registers and no step hardware
#[derive(Debug, Clone, Copy, Default)]
pub struct Mock;

impl Architecture for Mock
{
    const NAME: &'static str = "mock";
    const REGISTER_COUNT: usize = MOCK_REGISTER_COUNT;

    fn register_name(index: usize) -> Option<&'static str>
    {
        ["r0", "r1", "r2", "r3"].get(index).copied()
    }
}
