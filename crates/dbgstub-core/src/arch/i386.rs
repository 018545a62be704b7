//! 32-bit x86 register layout and trap-frame marshalling.
//!
//! GDB's `i386` target description orders the general registers
//! EAX ECX EDX EBX ESP EBP ESI EDI, then EIP, EFLAGS and the six segment
//! registers. The trap entry code pushes a different layout
//! ([`InterruptFrame`]), so the two are converted on the way in and out of a
//! debug session.

use super::Architecture;
use crate::types::{DebugState, Signal, Word};

/// Number of registers exposed by [`I386`]
pub const I386_REGISTER_COUNT: usize = 16;

/// Debug state for 32-bit x86
pub type I386State = DebugState<I386_REGISTER_COUNT>;

/// EFLAGS trap flag: the CPU raises vector 1 after the next instruction
pub const TRAP_FLAG: Word = 1 << 8;

/// Register numbers in GDB's `i386` order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum I386Register
{
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7,
    /// Program counter
    Eip = 8,
    /// Processor status
    Eflags = 9,
    Cs = 10,
    Ss = 11,
    Ds = 12,
    Es = 13,
    Fs = 14,
    Gs = 15,
}

impl I386Register
{
    /// Every register, in wire order
    pub const ALL: [Self; I386_REGISTER_COUNT] = [
        Self::Eax,
        Self::Ecx,
        Self::Edx,
        Self::Ebx,
        Self::Esp,
        Self::Ebp,
        Self::Esi,
        Self::Edi,
        Self::Eip,
        Self::Eflags,
        Self::Cs,
        Self::Ss,
        Self::Ds,
        Self::Es,
        Self::Fs,
        Self::Gs,
    ];

    /// Index of this register in the register image
    pub const fn index(self) -> usize
    {
        self as usize
    }

    /// Register at wire position `index`
    pub fn from_index(index: usize) -> Option<Self>
    {
        Self::ALL.get(index).copied()
    }

    /// Lowercase assembler name
    pub const fn name(self) -> &'static str
    {
        match self {
            Self::Eax => "eax",
            Self::Ecx => "ecx",
            Self::Edx => "edx",
            Self::Ebx => "ebx",
            Self::Esp => "esp",
            Self::Ebp => "ebp",
            Self::Esi => "esi",
            Self::Edi => "edi",
            Self::Eip => "eip",
            Self::Eflags => "eflags",
            Self::Cs => "cs",
            Self::Ss => "ss",
            Self::Ds => "ds",
            Self::Es => "es",
            Self::Fs => "fs",
            Self::Gs => "gs",
        }
    }
}

/// 32-bit x86
#[derive(Debug, Clone, Copy, Default)]
pub struct I386;

impl I386
{
    /// Translate the CPU exception vector that trapped into a stop signal
    ///
    /// Debug (1) and breakpoint (3) exceptions are `SIGTRAP`; anything else is
    /// reported as `SIGEMT`.
    ///
    /// ```rust
    /// use dbgstub_core::arch::I386;
    /// use dbgstub_core::types::Signal;
    ///
    /// assert_eq!(I386::signal_for_vector(3), Signal::TRAP);
    /// assert_eq!(I386::signal_for_vector(13), Signal::EMT);
    /// ```
    pub const fn signal_for_vector(vector: u32) -> Signal
    {
        match vector {
            1 | 3 => Signal::TRAP,
            _ => Signal::EMT,
        }
    }
}

impl Architecture for I386
{
    const NAME: &'static str = "i386";
    const REGISTER_COUNT: usize = I386_REGISTER_COUNT;

    fn register_name(index: usize) -> Option<&'static str>
    {
        I386Register::from_index(index).map(I386Register::name)
    }

    fn set_single_step(registers: &mut [Word], enabled: bool)
    {
        if let Some(eflags) = registers.get_mut(I386Register::Eflags.index()) {
            if enabled {
                *eflags |= TRAP_FLAG;
            } else {
                *eflags &= !TRAP_FLAG;
            }
        }
    }
}

/// CPU context saved by the trap entry code, in push order
///
/// `vector` and `error_code` are pushed by the entry stub and the CPU; they
/// are not part of the register image but `vector` decides the stop signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct InterruptFrame
{
    pub ss: u32,
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

impl InterruptFrame
{
    /// Build the debug state for a session from the saved context
    #[must_use]
    pub fn capture(&self) -> I386State
    {
        use I386Register as R;

        let mut registers = [0; I386_REGISTER_COUNT];
        registers[R::Eax.index()] = self.eax;
        registers[R::Ecx.index()] = self.ecx;
        registers[R::Edx.index()] = self.edx;
        registers[R::Ebx.index()] = self.ebx;
        registers[R::Esp.index()] = self.esp;
        registers[R::Ebp.index()] = self.ebp;
        registers[R::Esi.index()] = self.esi;
        registers[R::Edi.index()] = self.edi;
        registers[R::Eip.index()] = self.eip;
        registers[R::Eflags.index()] = self.eflags;
        registers[R::Cs.index()] = self.cs;
        registers[R::Ss.index()] = self.ss;
        registers[R::Ds.index()] = self.ds;
        registers[R::Es.index()] = self.es;
        registers[R::Fs.index()] = self.fs;
        registers[R::Gs.index()] = self.gs;

        DebugState::with_registers(I386::signal_for_vector(self.vector), registers)
    }

    /// Write the (possibly edited) register file back before returning from the trap
    ///
    /// `vector` and `error_code` are left untouched.
    pub fn restore(&mut self, state: &I386State)
    {
        use I386Register as R;

        let regs = &state.registers;
        self.eax = regs[R::Eax.index()];
        self.ecx = regs[R::Ecx.index()];
        self.edx = regs[R::Edx.index()];
        self.ebx = regs[R::Ebx.index()];
        self.esp = regs[R::Esp.index()];
        self.ebp = regs[R::Ebp.index()];
        self.esi = regs[R::Esi.index()];
        self.edi = regs[R::Edi.index()];
        self.eip = regs[R::Eip.index()];
        self.eflags = regs[R::Eflags.index()];
        self.cs = regs[R::Cs.index()];
        self.ss = regs[R::Ss.index()];
        self.ds = regs[R::Ds.index()];
        self.es = regs[R::Es.index()];
        self.fs = regs[R::Fs.index()];
        self.gs = regs[R::Gs.index()];
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_register_order_matches_gdb()
    {
        assert_eq!(I386Register::Eip.index(), 8);
        assert_eq!(I386Register::Eflags.index(), 9);
        assert_eq!(I386Register::Gs.index(), 15);
        assert_eq!(I386::register_name(4), Some("esp"));
        assert_eq!(I386::register_name(16), None);
    }

    #[test]
    fn test_frame_round_trip()
    {
        let mut frame = InterruptFrame {
            eax: 0x1111,
            ecx: 0x2222,
            eip: 0x0010_0000,
            eflags: 0x202,
            cs: 0x08,
            ss: 0x10,
            vector: 3,
            ..InterruptFrame::default()
        };

        let mut state = frame.capture();
        assert_eq!(state.signal, Signal::TRAP);
        assert_eq!(state.registers[I386Register::Eax.index()], 0x1111);
        assert_eq!(state.registers[I386Register::Eip.index()], 0x0010_0000);
        assert_eq!(state.registers[I386Register::Ss.index()], 0x10);

        state.registers[I386Register::Eip.index()] = 0x0010_0004;
        frame.restore(&state);
        assert_eq!(frame.eip, 0x0010_0004);
        assert_eq!(frame.ecx, 0x2222);
        assert_eq!(frame.vector, 3);
    }

    #[test]
    fn test_single_step_toggles_trap_flag()
    {
        let mut registers = [0; I386_REGISTER_COUNT];
        registers[I386Register::Eflags.index()] = 0x202;

        I386::set_single_step(&mut registers, true);
        assert_eq!(registers[I386Register::Eflags.index()], 0x302);

        I386::set_single_step(&mut registers, false);
        assert_eq!(registers[I386Register::Eflags.index()], 0x202);
    }
}
