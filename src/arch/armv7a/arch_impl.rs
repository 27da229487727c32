//! ARMv7-A architecture implementation

use core::arch::asm;

use crate::addr::PhysRange;
use crate::arch::Architecture;
use crate::handoff::HandoffParams;

/// ARMv7-A architecture implementation
pub struct ArchImpl;

impl Architecture for ArchImpl {
    fn halt() -> ! {
        loop {
            Self::wait_for_interrupt();
        }
    }

    fn wait_for_interrupt() {
        unsafe {
            asm!("wfi", options(nomem, nostack, preserves_flags));
        }
    }

    fn read_sctlr() -> u32 {
        let sctlr: u32;
        unsafe {
            asm!("mrc p15, 0, {}, c1, c0, 0", out(reg) sctlr, options(nomem, nostack, preserves_flags));
        }
        sctlr
    }
}

/// Smallest data cache line, from CTR.DminLine
fn dcache_line_size() -> u32 {
    let ctr: u32;
    unsafe {
        asm!("mrc p15, 0, {}, c0, c0, 1", out(reg) ctr, options(nomem, nostack, preserves_flags));
    }
    4 << ((ctr >> 16) & 0xf)
}

/// Push `range` out of the data cache to the point of unification
///
/// The first-stage loader may leave the D-cache on; freshly copied code has
/// to reach the level the instruction side fetches from before it runs.
pub fn clean_dcache_to_pou(range: PhysRange) {
    let line = dcache_line_size();
    let mut addr = range.start().align_down(line).as_u64();
    while addr < range.end() {
        unsafe {
            // DCCMVAU
            asm!("mcr p15, 0, {}, c7, c11, 1", in(reg) addr as u32, options(nostack, preserves_flags));
        }
        addr += line as u64;
    }
    unsafe {
        asm!("dsb", options(nostack, preserves_flags));
    }
}

/// Jump to the kernel; never returns
///
/// Invalidates the I-cache and branch predictor, then enters with
/// `r0` = load address, `r1` = reserved size and `sp` = stack top.
///
/// # Safety
///
/// The kernel image must be loaded and verified at `params.entry` and made
/// visible to instruction fetch with [`clean_dcache_to_pou`].
pub unsafe fn enter_kernel(params: &HandoffParams) -> ! {
    asm!(
        "dsb",
        "mcr p15, 0, {zero}, c7, c5, 0", // ICIALLU
        "mcr p15, 0, {zero}, c7, c5, 6", // BPIALL
        "dsb",
        "isb",
        "mov sp, {stack}",
        "bx {entry}",
        zero = in(reg) 0u32,
        stack = in(reg) params.stack_top.as_u32(),
        entry = in(reg) params.entry.as_u32(),
        in("r0") params.entry.as_u32(),
        in("r1") params.reserved_size,
        options(noreturn),
    )
}
