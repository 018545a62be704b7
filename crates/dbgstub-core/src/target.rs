//! # Target
//!
//! The debuggee half of the capability interface.
//!
//! Registers travel in the [`DebugState`] the caller owns; everything else the
//! protocol engine needs from the debuggee is here: byte-wise memory access
//! and the two ways of handing the CPU back (resume and single-step).
//!
//! Memory is accessed one byte at a time on purpose. A bare-metal stub reads
//! through a volatile pointer and a single faulting byte must abort the whole
//! transfer, so the engine never asks for more than one byte per call.

use std::marker::PhantomData;

use tracing::trace;

use crate::arch::Architecture;
use crate::error::{TargetError, TargetResult};
use crate::types::{Address, DebugState};

/// Memory and execution control of a halted target
///
/// `N` is the register count of the [`DebugState`] this target is debugged
/// with.
pub trait Target<const N: usize>
{
    /// Read one byte of target memory
    ///
    /// ## Errors
    ///
    /// `InvalidAddress` if `addr` is not readable.
    fn read_memory_byte(&mut self, addr: Address) -> TargetResult<u8>;

    /// Write one byte of target memory
    ///
    /// ## Errors
    ///
    /// `InvalidAddress` if `addr` is not writable.
    fn write_memory_byte(&mut self, addr: Address, value: u8) -> TargetResult<()>;

    /// Prepare the target to run freely once the session returns
    ///
    /// Clears any single-step mode left over from a previous `s`.
    ///
    /// ## Errors
    ///
    /// `Unsupported` if the target cannot be resumed.
    fn resume(&mut self, state: &mut DebugState<N>) -> TargetResult<()>;

    /// Prepare the target to execute exactly one instruction once the session returns
    ///
    /// ## Errors
    ///
    /// `Unsupported` if the target cannot single-step.
    fn single_step(&mut self, state: &mut DebugState<N>) -> TargetResult<()>;
}

impl<const N: usize, T: Target<N> + ?Sized> Target<N> for &mut T
{
    fn read_memory_byte(&mut self, addr: Address) -> TargetResult<u8>
    {
        (**self).read_memory_byte(addr)
    }

    fn write_memory_byte(&mut self, addr: Address, value: u8) -> TargetResult<()>
    {
        (**self).write_memory_byte(addr, value)
    }

    fn resume(&mut self, state: &mut DebugState<N>) -> TargetResult<()>
    {
        (**self).resume(state)
    }

    fn single_step(&mut self, state: &mut DebugState<N>) -> TargetResult<()>
    {
        (**self).single_step(state)
    }
}

/// Default amount of RAM backing a [`RamTarget`]
pub const DEFAULT_RAM_SIZE: usize = 256;

/// Target backed by a flat block of host memory
///
/// Memory spans `[base, base + size)`; any access outside it fails with
/// [`TargetError::InvalidAddress`]. Resume and single-step delegate to the
/// architecture (on i386 they toggle the EFLAGS trap flag) and are counted so
/// hosts and tests can see what the debugger asked for.
///
/// The register file must have `A::REGISTER_COUNT` entries; any other `N`
/// fails to build.
///
/// ```rust,compile_fail
/// use dbgstub_core::arch::I386;
/// use dbgstub_core::target::{RamTarget, Target};
/// use dbgstub_core::types::{DebugState, Signal};
///
/// let mut target = RamTarget::<I386>::new(16);
/// let mut state = DebugState::<4>::new(Signal::TRAP);
/// target.single_step(&mut state).unwrap();
/// ```
///
/// ## Example
///
/// ```rust
/// use dbgstub_core::arch::Mock;
/// use dbgstub_core::target::{RamTarget, Target};
/// use dbgstub_core::types::Address;
///
/// let mut target = RamTarget::<Mock>::new(16);
/// Target::<4>::write_memory_byte(&mut target, Address::new(3), 0xaa).unwrap();
/// assert_eq!(target.memory()[3], 0xaa);
/// assert!(Target::<4>::read_memory_byte(&mut target, Address::new(16)).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RamTarget<A: Architecture>
{
    base: Address,
    memory: Vec<u8>,
    resumes: usize,
    steps: usize,
    arch: PhantomData<A>,
}

impl<A: Architecture> RamTarget<A>
{
    /// Zero-filled RAM of `size` bytes at address 0
    #[must_use]
    pub fn new(size: usize) -> Self
    {
        Self::with_base(Address::ZERO, vec![0; size])
    }

    /// RAM at `base` initialised from `memory`
    #[must_use]
    pub fn with_base(base: Address, memory: Vec<u8>) -> Self
    {
        Self {
            base,
            memory,
            resumes: 0,
            steps: 0,
            arch: PhantomData,
        }
    }

    /// Copy `bytes` into RAM starting at `addr`
    ///
    /// ## Errors
    ///
    /// `InvalidAddress` (naming the first byte that does not fit) if the image
    /// runs past either end of RAM. Nothing is written in that case.
    pub fn load(&mut self, addr: Address, bytes: &[u8]) -> TargetResult<()>
    {
        let start = self.index_of(addr)?;
        let end = start
            .checked_add(bytes.len())
            .filter(|&end| end <= self.memory.len())
            .ok_or(TargetError::InvalidAddress(self.base + self.memory.len() as u64))?;
        self.memory[start..end].copy_from_slice(bytes);
        Ok(())
    }

    /// First address backed by RAM
    #[must_use]
    pub fn base(&self) -> Address
    {
        self.base
    }

    /// RAM contents
    #[must_use]
    pub fn memory(&self) -> &[u8]
    {
        &self.memory
    }

    /// Mutable RAM contents
    pub fn memory_mut(&mut self) -> &mut [u8]
    {
        &mut self.memory
    }

    /// How many times the debugger resumed this target
    #[must_use]
    pub fn resume_count(&self) -> usize
    {
        self.resumes
    }

    /// How many times the debugger single-stepped this target
    #[must_use]
    pub fn step_count(&self) -> usize
    {
        self.steps
    }

    fn check_register_count<const N: usize>()
    {
        const {
            assert!(A::REGISTER_COUNT == N, "register file does not match the architecture");
        }
    }

    fn index_of(&self, addr: Address) -> TargetResult<usize>
    {
        addr.offset_from(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|&index| index < self.memory.len())
            .ok_or(TargetError::InvalidAddress(addr))
    }
}

impl<A: Architecture, const N: usize> Target<N> for RamTarget<A>
{
    fn read_memory_byte(&mut self, addr: Address) -> TargetResult<u8>
    {
        Self::check_register_count::<N>();
        let index = self.index_of(addr)?;
        Ok(self.memory[index])
    }

    fn write_memory_byte(&mut self, addr: Address, value: u8) -> TargetResult<()>
    {
        Self::check_register_count::<N>();
        let index = self.index_of(addr)?;
        self.memory[index] = value;
        Ok(())
    }

    fn resume(&mut self, state: &mut DebugState<N>) -> TargetResult<()>
    {
        Self::check_register_count::<N>();
        A::set_single_step(&mut state.registers, false);
        self.resumes += 1;
        trace!(arch = A::NAME, resumes = self.resumes, "target resumed");
        Ok(())
    }

    fn single_step(&mut self, state: &mut DebugState<N>) -> TargetResult<()>
    {
        Self::check_register_count::<N>();
        A::set_single_step(&mut state.registers, true);
        self.steps += 1;
        trace!(arch = A::NAME, steps = self.steps, "target single-stepped");
        Ok(())
    }
}
