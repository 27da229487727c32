//! Architecture-specific code
//!
//! The bootloader targets ARMv7-A. Everything the library needs from the
//! CPU goes through [`Architecture`], so the boot logic also builds for the
//! host, where tests run against the hosted stand-in.

#[cfg(target_arch = "arm")]
pub mod armv7a;

#[cfg(not(target_arch = "arm"))]
pub mod hosted;

// Re-export current architecture
#[cfg(target_arch = "arm")]
pub use armv7a::*;

#[cfg(not(target_arch = "arm"))]
pub use hosted::*;

/// CPU operations the boot and trap paths rely on
pub trait Architecture {
    /// Idle forever
    fn halt() -> !;

    /// Wait for the next interrupt, or return at once if none can arrive
    fn wait_for_interrupt();

    /// Current system control register
    fn read_sctlr() -> u32;
}

/// Stop the CPU for good
pub fn halt() -> ! {
    ArchImpl::halt()
}

/// System control register (SCTLR) value, 0 where there is none
pub fn read_sctlr() -> u32 {
    ArchImpl::read_sctlr()
}
