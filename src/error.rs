//! Boot error types
//!
//! Nothing in the bootloader recovers from an error: every variant ends in a
//! halt. The enum exists so the checks stay testable and the single place
//! that decides to halt can print a precise reason.

use thiserror::Error;

use crate::addr::{PhysAddr, PhysRange};

/// Everything that can stop a boot before the kernel is entered
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    #[error("kernel image is empty")]
    EmptyImage,

    #[error("range at {start} of 0x{len:x} bytes runs past the 32-bit address space")]
    AddressOverflow { start: PhysAddr, len: u32 },

    #[error("range {0} is outside RAM")]
    OutOfRam(PhysRange),

    #[error("invalid memory layout: {0}")]
    InvalidLayout(&'static str),

    #[error("kernel footprint ends at 0x{end:x}, past the reserved zone at {limit}")]
    FootprintOverlapsReserved { end: u64, limit: PhysAddr },

    #[error("kernel image {image} overlaps zeroed region {region}")]
    SourceOverlap { image: PhysRange, region: PhysRange },

    #[error("protected range {protected} overlaps zeroed region {region}")]
    ProtectedOverlap {
        protected: PhysRange,
        region: PhysRange,
    },

    #[error("mismatch at address {addr}: expected 0x{expected:x}, found 0x{found:x}")]
    VerifyMismatch {
        addr: PhysAddr,
        expected: u32,
        found: u32,
    },
}
