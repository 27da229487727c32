//! Serial console for the bootloader
//!
//! Polled, transmit-only output on the board's debug UART. Every `\n` goes
//! out as `\r\n`. Under `cfg(test)` the bytes land in a buffer instead.

#![cfg_attr(test, allow(dead_code))]

use core::fmt::{self, Write};
use spin::{Mutex, MutexGuard};

/// i.MX6 UART2, the console UART of the sabrelite board
const UART_BASE: usize = 0x021e_8000;

/// Transmitter register
const UTXD: usize = 0x40;
/// Test register; bit 4 is TXFULL
const UTS: usize = 0xb4;
const UTS_TXFULL: u32 = 1 << 4;

struct Uart {
    base: usize,
}

impl Uart {
    const fn new(base: usize) -> Self {
        Self { base }
    }

    unsafe fn putc(&self, c: u8) {
        let uts = (self.base + UTS) as *const u32;
        while uts.read_volatile() & UTS_TXFULL != 0 {
            core::hint::spin_loop();
        }
        let txd = (self.base + UTXD) as *mut u32;
        txd.write_volatile(c as u32);
    }
}

/// Console writer
pub struct Console {
    #[cfg(test)]
    buffer: heapless::String<1024>,
}

impl Console {
    pub const fn new() -> Self {
        Console {
            #[cfg(test)]
            buffer: heapless::String::new(),
        }
    }

    /// Write one raw byte
    pub fn write_byte(&mut self, byte: u8) {
        #[cfg(test)]
        {
            if byte.is_ascii() {
                let _ = self.buffer.push(byte as char);
            }
        }

        #[cfg(not(test))]
        {
            // SAFETY: UART_BASE is the board's console UART, set up by the
            // first-stage loader
            unsafe {
                Uart::new(UART_BASE).putc(byte);
            }
        }
    }

    /// Write a string, expanding `\n` to `\r\n`
    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }

    /// Drop buffered output (test builds only keep any)
    pub fn clear(&mut self) {
        #[cfg(test)]
        self.buffer.clear();
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Console::write_str(self, s);
        Ok(())
    }
}

static CONSOLE: Mutex<Console> = Mutex::new(Console::new());

/// Bring the console into a known state
///
/// The first-stage loader has already configured the UART's clocks, pins
/// and baud rate; nothing is reprogrammed here.
pub fn init() {
    CONSOLE.lock().clear();
}

/// Print formatted text to the console
pub fn print(args: fmt::Arguments) {
    // Console writes cannot fail
    let _ = CONSOLE.lock().write_fmt(args);
}

/// `fmt::Write` sink for library code that reports progress
pub struct Serial;

impl fmt::Write for Serial {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print(format_args!("{}", s));
        Ok(())
    }
}

/// Take the console for a path that never returns
///
/// A trap or panic may have interrupted code that was holding the lock, and
/// that code will never run again, so the lock is broken instead of waited on.
pub fn emergency() -> MutexGuard<'static, Console> {
    if CONSOLE.is_locked() {
        // SAFETY: single core; the previous holder can no longer run
        unsafe { CONSOLE.force_unlock() };
    }
    CONSOLE.lock()
}

/// Print to the console
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::print(format_args!($($arg)*));
    };
}

/// Print to the console, with newline
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n");
    };
    ($($arg:tt)*) => {
        $crate::console::print(format_args!("{}\n", format_args!($($arg)*)))
    };
}
