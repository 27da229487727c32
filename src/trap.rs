//! Diagnostic trap handler
//!
//! Until the kernel installs its own vectors, any exception lands here. The
//! handler names the exception, dumps the register file and halts. There is
//! no recovery: the bootloader has no point to resume from.
//!
//! Output, one line each, with `\r\n` endings on the serial console:
//!
//! ```text
//! data abort from addr 0x10000040
//!      sctlr: 0xc50078
//!      r0: 0x...
//!      ...
//!      r12: 0x...
//!      fp: 0x...
//!      lr: 0x...
//!      sp: 0x...
//! ```

use core::fmt::{self, Write};

/// Exception classes, numbered as the vector stubs report them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    /// Undefined instruction
    Undefined,
    /// `svc` instruction
    SupervisorCall,
    /// Instruction fetch abort
    PrefetchAbort,
    /// Data access abort
    DataAbort,
    /// Interrupt request
    Irq,
    /// Fast interrupt request
    Fiq,
    /// A code no vector stub produces
    Unknown(u32),
}

impl TrapCause {
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => TrapCause::Undefined,
            2 => TrapCause::SupervisorCall,
            3 => TrapCause::PrefetchAbort,
            4 => TrapCause::DataAbort,
            5 => TrapCause::Irq,
            6 => TrapCause::Fiq,
            other => TrapCause::Unknown(other),
        }
    }

    pub const fn code(self) -> u32 {
        match self {
            TrapCause::Undefined => 1,
            TrapCause::SupervisorCall => 2,
            TrapCause::PrefetchAbort => 3,
            TrapCause::DataAbort => 4,
            TrapCause::Irq => 5,
            TrapCause::Fiq => 6,
            TrapCause::Unknown(code) => code,
        }
    }
}

/// Register state saved by the vector stubs
///
/// Field order is the stack layout the stubs build, lowest address first:
/// cause, `lr`, `sp`, then `r0`..`r12`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrapFrame {
    /// Cause code, see [`TrapCause`]
    pub cause: u32,
    /// Exception-mode link register
    pub lr: u32,
    /// Stack pointer of the interrupted context
    pub sp: u32,
    /// `r0`..`r12`; `r11` is the frame pointer
    pub gpr: [u32; 13],
}

const _: () = assert!(core::mem::size_of::<TrapFrame>() == 64);

/// Labels of the register dump, in print order
pub const REGISTER_LABELS: [&str; 16] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "fp", "lr",
    "sp",
];

impl TrapFrame {
    /// Index of the frame pointer in [`TrapFrame::gpr`]
    pub const FP: usize = 11;

    pub fn cause(&self) -> TrapCause {
        TrapCause::from_code(self.cause)
    }

    /// Frame pointer (`r11`)
    pub fn fp(&self) -> u32 {
        self.gpr[Self::FP]
    }

    /// Address of the faulting instruction, for the causes that have one
    ///
    /// ARM leaves `lr` 4 bytes past an `svc` and 8 bytes past an access
    /// that data-aborted.
    pub fn fault_addr(&self) -> Option<u32> {
        match self.cause() {
            TrapCause::SupervisorCall => Some(self.lr.wrapping_sub(4)),
            TrapCause::DataAbort => Some(self.lr.wrapping_sub(8)),
            _ => None,
        }
    }

    /// Register values paired with their dump labels
    pub fn registers(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        let values = self
            .gpr
            .iter()
            .copied()
            .chain([self.fp(), self.lr, self.sp]);
        REGISTER_LABELS.iter().copied().zip(values)
    }
}

/// The one-line description of the exception
pub struct Diagnosis<'a>(pub &'a TrapFrame);

impl fmt::Display for Diagnosis<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.0;
        let at = frame.fault_addr().unwrap_or_default();
        match frame.cause() {
            TrapCause::Undefined => f.write_str("undefined trap"),
            TrapCause::SupervisorCall => write!(f, "svc from addr 0x{:x}", at),
            TrapCause::PrefetchAbort => f.write_str("prefetch abort"),
            TrapCause::DataAbort => write!(f, "data abort from addr 0x{:x}", at),
            TrapCause::Irq => f.write_str("irq trap"),
            TrapCause::Fiq => f.write_str("fiq trap"),
            TrapCause::Unknown(code) => write!(f, "unknown trap {}", code),
        }
    }
}

/// Write the description, `sctlr` and the 16-register dump
pub fn report<W: Write + ?Sized>(frame: &TrapFrame, sctlr: u32, out: &mut W) -> fmt::Result {
    writeln!(out, "{}", Diagnosis(frame))?;
    writeln!(out, "\t sctlr: 0x{:x}", sctlr)?;
    for (label, value) in frame.registers() {
        writeln!(out, "\t {}: 0x{:x}", label, value)?;
    }
    Ok(())
}

/// Report the trap on the console and halt
pub fn handle_trap(frame: &TrapFrame) -> ! {
    let sctlr = crate::arch::read_sctlr();
    {
        let mut console = crate::console::emergency();
        let _ = report(frame, sctlr, &mut *console);

        #[cfg(feature = "backtrace")]
        {
            let layout = crate::boot::layout();
            // SAFETY: read-only walk over RAM; nothing else runs after a trap
            let mem = unsafe { crate::mem::RawMemory::new(layout.ram()) };
            let _ = crate::backtrace::report(frame.fp(), &mem, &mut *console);
        }
    }
    crate::arch::halt()
}
