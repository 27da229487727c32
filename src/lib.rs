//! Biscuit-ARM second-stage bootloader
//!
//! Copies the kernel image embedded in the bootloader to its fixed load
//! address, verifies the copy, and jumps to it with the load address in
//! `r0`, the reserved size in `r1` and a fresh stack. Exceptions taken
//! before the kernel installs its own vectors end in a register dump.
//!
//! All of the boot logic lives here and runs on the host under test; the
//! `biscuit_boot` binary only supplies the image and the bare-metal entry.

#![cfg_attr(not(test), no_std)]
// Hardware register code often uses explicit bit shifts for documentation
#![allow(clippy::identity_op)]
// Explicit casts are kept for memory-mapped I/O
#![allow(clippy::unnecessary_cast)]

pub mod addr;
pub mod arch;
pub mod backtrace;
pub mod boot;
pub mod console;
pub mod error;
pub mod handoff;
pub mod layout;
pub mod loader;
pub mod mem;
pub mod panic;
pub mod trap;

pub use error::BootError;

/// Bootloader version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Bootloader name
pub const NAME: &str = "Biscuit-ARM";
