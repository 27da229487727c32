//! Panic handler

use core::fmt::Write;
use core::panic::PanicInfo;

/// Print the panic and halt
pub fn boot_panic(info: &PanicInfo) -> ! {
    {
        let mut console = crate::console::emergency();
        let _ = report(info, &mut *console);
    }
    crate::arch::halt()
}

fn report<W: Write + ?Sized>(info: &PanicInfo, out: &mut W) -> core::fmt::Result {
    writeln!(out, "\n[BOOT] PANIC")?;
    if let Some(location) = info.location() {
        writeln!(out, "Location: {}:{}", location.file(), location.line())?;
    }
    writeln!(out, "Message: {}", info.message())?;
    writeln!(out, "System halted.")
}
