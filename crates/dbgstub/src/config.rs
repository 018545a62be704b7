//! Target configuration shared by every serving mode.

use std::fs;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use dbgstub_core::arch::Architecture;
use dbgstub_core::target::DEFAULT_RAM_SIZE;
use dbgstub_core::types::{Address, DebugState, Signal};
use dbgstub_core::{RamTarget, Result, StubError};
use dbgstub_protocol::codec::parse_integer;
use dbgstub_utils::info;

/// Register layout and step hardware of the simulated target
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchKind
{
    /// Four anonymous 32-bit registers, no trap flag
    Mock,
    /// 32-bit x86: sixteen registers, EFLAGS trap flag
    I386,
}

/// How to build the RAM-backed target a debugger connects to
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig
{
    /// Target architecture
    #[arg(long, value_enum, default_value_t = ArchKind::Mock, env = "DBGSTUB_ARCH")]
    pub arch: ArchKind,

    /// Bytes of RAM, starting at address 0
    #[arg(long, default_value_t = DEFAULT_RAM_SIZE, env = "DBGSTUB_MEMORY_SIZE")]
    pub memory_size: usize,

    /// Raw binary to copy into RAM before the first session
    #[arg(long, env = "DBGSTUB_IMAGE")]
    pub image: Option<PathBuf>,

    /// Where the image is loaded (decimal, or hex with 0x)
    #[arg(long, value_parser = parse_address, default_value = "0", env = "DBGSTUB_LOAD_ADDRESS")]
    pub load_address: Address,

    /// Signal announced when the debugger first connects
    #[arg(long, default_value_t = Signal::TRAP.number(), env = "DBGSTUB_SIGNAL")]
    pub signal: u8,
}

impl TargetConfig
{
    /// Stop signal for the first session
    #[must_use]
    pub fn initial_signal(&self) -> Signal
    {
        Signal::new(self.signal)
    }

    /// Fresh debug state for an architecture with `N` registers
    #[must_use]
    pub fn initial_state<const N: usize>(&self) -> DebugState<N>
    {
        DebugState::new(self.initial_signal())
    }

    /// Allocate RAM and load the image, if any
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument` for zero-sized RAM
    /// - `Io` if the image cannot be read
    /// - `Target` if the image does not fit at the load address
    pub fn build_target<A: Architecture>(&self) -> Result<RamTarget<A>>
    {
        if self.memory_size == 0 {
            return Err(StubError::InvalidArgument("memory size must be at least one byte".to_string()));
        }

        let mut target = RamTarget::new(self.memory_size);
        if let Some(path) = &self.image {
            let bytes = fs::read(path)?;
            target.load(self.load_address, &bytes)?;
            info!(
                image = %path.display(),
                size = bytes.len(),
                address = %self.load_address,
                "loaded image"
            );
        }
        Ok(target)
    }
}

/// Parse `0x`-prefixed hex or plain decimal into an address
pub fn parse_address(text: &str) -> std::result::Result<Address, String>
{
    let invalid = || format!("invalid address '{text}'");
    let parsed = parse_integer(text.as_bytes(), 0).ok_or_else(invalid)?;
    if parsed.consumed != text.len() || parsed.value < 0 {
        return Err(invalid());
    }
    u64::try_from(parsed.value).map(Address::new).map_err(|_| invalid())
}
