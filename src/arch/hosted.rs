//! Stand-in used when the library is built for the development host

use crate::arch::Architecture;

pub struct ArchImpl;

impl Architecture for ArchImpl {
    fn halt() -> ! {
        loop {
            Self::wait_for_interrupt();
        }
    }

    fn wait_for_interrupt() {
        core::hint::spin_loop();
    }

    fn read_sctlr() -> u32 {
        0
    }
}
