//! Kernel hand-off parameters
//!
//! The kernel entry contract: `r0` holds the load address, `r1` the number
//! of bytes reserved for the kernel (image plus stack), and `sp` the top of
//! the boot stack rounded down to 16 bytes. Control arrives at the load
//! address itself.

use core::fmt;

use crate::addr::PhysAddr;
use crate::error::BootError;
use crate::layout::MemoryLayout;

/// Values delivered to the kernel at the jump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffParams {
    /// Entry point, equal to the load address; passed in `r0`
    pub entry: PhysAddr,
    /// Image size plus stack size; passed in `r1`
    pub reserved_size: u32,
    /// Initial `sp`
    pub stack_top: PhysAddr,
}

impl HandoffParams {
    /// Compute the hand-off for an image of `image_size` bytes
    pub fn compute(layout: &MemoryLayout, image_size: u32) -> Result<Self, BootError> {
        let reserved_size = image_size
            .checked_add(layout.stack_size)
            .ok_or(BootError::AddressOverflow {
                start: layout.load_addr(),
                len: image_size,
            })?;
        Ok(Self {
            entry: layout.load_addr(),
            reserved_size,
            stack_top: layout.stack_top(),
        })
    }

    /// The two argument registers, in order
    pub fn args(&self) -> (u32, u32) {
        (self.entry.as_u32(), self.reserved_size)
    }
}

impl fmt::Display for HandoffParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry={} r0=0x{:x} r1=0x{:x} sp={}",
            self.entry, self.entry.0, self.reserved_size, self.stack_top
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_handoff() {
        let layout = MemoryLayout::platform();
        let params = HandoffParams::compute(&layout, 4096).unwrap();
        assert_eq!(params.args(), (0x1000_0000, 0x5000));
        assert_eq!(params.stack_top, PhysAddr(0x8ff0_4000));
    }

    #[test]
    fn test_reserved_size_overflow() {
        let layout = MemoryLayout::platform();
        assert!(HandoffParams::compute(&layout, u32::MAX - 0x100).is_err());
    }
}
