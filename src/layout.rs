//! Physical memory layout policy
//!
//! One immutable [`MemoryLayout`] is built at startup and passed by
//! reference to the loader and the hand-off computation. The picture it
//! describes, for the platform values:
//!
//! ```text
//! 0x1000_0000  RAM_START == KERNEL_LOAD_ADDR
//!              kernel image, then STACK_SIZE bytes
//!     ...
//! 0x8ff0_0000  reserved zone (1 MiB, zeroed); the kernel's boot stack
//!              grows down from 0x8ff0_4000
//! 0x9000_0000  RAM end
//! ```

use crate::addr::{PhysAddr, PhysRange, ADDRESS_SPACE_END};
use crate::error::BootError;

/// Physical base of RAM
pub const RAM_START: u32 = 0x1000_0000;
/// Total RAM span
pub const RAM_SIZE: u32 = 0x8000_0000;
/// Guard/scratch zone at the top of RAM
pub const RESERVED_ZONE_SIZE: u32 = 0x0010_0000;
/// Where the kernel image is copied and entered
pub const KERNEL_LOAD_ADDR: u32 = 0x1000_0000;
/// Bytes reserved for the kernel's initial stack
pub const STACK_SIZE: u32 = 0x4000;

/// Alignment of the stack pointer handed to the kernel
pub const STACK_ALIGN: u32 = 16;

/// Memory layout policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Physical base of RAM
    pub ram_start: u32,
    /// Total RAM span in bytes
    pub ram_size: u32,
    /// Size of the zeroed zone at the top of RAM
    pub reserved_zone_size: u32,
    /// Fixed physical load (and entry) address of the kernel
    pub kernel_load_addr: u32,
    /// Kernel stack bytes following the image
    pub stack_size: u32,
}

impl MemoryLayout {
    /// Layout of the target board
    pub const fn platform() -> Self {
        Self {
            ram_start: RAM_START,
            ram_size: RAM_SIZE,
            reserved_zone_size: RESERVED_ZONE_SIZE,
            kernel_load_addr: KERNEL_LOAD_ADDR,
            stack_size: STACK_SIZE,
        }
    }

    /// Check the layout on its own, before any image is known
    pub fn validate(&self) -> Result<(), BootError> {
        if self.ram_start as u64 + self.ram_size as u64 > ADDRESS_SPACE_END {
            return Err(BootError::InvalidLayout("RAM runs past the 32-bit address space"));
        }
        if self.reserved_zone_size > self.ram_size {
            return Err(BootError::InvalidLayout("reserved zone is larger than RAM"));
        }
        if self.stack_size > self.reserved_zone_size {
            return Err(BootError::InvalidLayout("stack does not fit in the reserved zone"));
        }
        if !self.ram().contains_addr(self.load_addr()) {
            return Err(BootError::InvalidLayout("load address is outside RAM"));
        }
        if self.load_addr().as_u64() >= self.reserved_zone_start().as_u64() {
            return Err(BootError::InvalidLayout("load address is inside the reserved zone"));
        }
        Ok(())
    }

    /// All of RAM
    pub fn ram(&self) -> PhysRange {
        // `validate` rejects layouts where this is cut short
        PhysRange::clamped(PhysAddr(self.ram_start), self.ram_size as u64)
    }

    /// One past the last byte of RAM
    pub fn ram_end(&self) -> u64 {
        self.ram_start as u64 + self.ram_size as u64
    }

    /// First byte of the reserved zone
    pub fn reserved_zone_start(&self) -> PhysAddr {
        PhysAddr((self.ram_end() - self.reserved_zone_size as u64) as u32)
    }

    /// The zeroed guard zone at the top of RAM
    pub fn reserved_zone(&self) -> PhysRange {
        PhysRange::clamped(self.reserved_zone_start(), self.reserved_zone_size as u64)
    }

    pub fn load_addr(&self) -> PhysAddr {
        PhysAddr(self.kernel_load_addr)
    }

    /// Bytes the kernel owns from its load address: the image plus its stack
    pub fn kernel_footprint(&self, image_size: u32) -> u64 {
        image_size as u64 + self.stack_size as u64
    }

    /// Top of the kernel's boot stack, rounded down to [`STACK_ALIGN`]
    pub fn stack_top(&self) -> PhysAddr {
        let top = self.reserved_zone_start().as_u64() + self.stack_size as u64;
        PhysAddr(top as u32).align_down(STACK_ALIGN)
    }

    /// Check that an image of `image_size` bytes fits below the reserved zone
    pub fn check_footprint(&self, image_size: u32) -> Result<(), BootError> {
        let end = self.load_addr().as_u64() + self.kernel_footprint(image_size);
        let limit = self.reserved_zone_start();
        if end > limit.as_u64() {
            return Err(BootError::FootprintOverlapsReserved { end, limit });
        }
        Ok(())
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::platform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_layout_is_valid() {
        let layout = MemoryLayout::platform();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.ram_end(), 0x9000_0000);
        assert_eq!(layout.reserved_zone_start(), PhysAddr(0x8ff0_0000));
    }

    #[test]
    fn test_stack_top_is_aligned_in_reserved_zone() {
        let layout = MemoryLayout::platform();
        assert_eq!(layout.stack_top(), PhysAddr(0x8ff0_4000));

        let odd = MemoryLayout {
            stack_size: 0x4009,
            ..layout
        };
        assert_eq!(odd.stack_top(), PhysAddr(0x8ff0_4000));
        assert_eq!(odd.stack_top().as_u32() % STACK_ALIGN, 0);
    }

    #[test]
    fn test_footprint_check() {
        let layout = MemoryLayout {
            ram_start: 0x1000_0000,
            ram_size: 0x0010_0000,
            reserved_zone_size: 0x0001_0000,
            kernel_load_addr: 0x1000_0000,
            stack_size: 0x4000,
        };
        // 0xf0000 bytes below the zone, of which 0x4000 are stack
        assert!(layout.check_footprint(0xec000).is_ok());
        assert_eq!(
            layout.check_footprint(0xec001),
            Err(BootError::FootprintOverlapsReserved {
                end: 0x100f_0001,
                limit: PhysAddr(0x100f_0000),
            })
        );
    }

    #[test]
    fn test_invalid_layouts() {
        let base = MemoryLayout::platform();
        let cases = [
            MemoryLayout { ram_start: 0xf000_0000, ..base },
            MemoryLayout { reserved_zone_size: 0x9000_0000, ..base },
            MemoryLayout { stack_size: 0x0020_0000, ..base },
            MemoryLayout { kernel_load_addr: 0x0800_0000, ..base },
            MemoryLayout { kernel_load_addr: 0x8ff8_0000, ..base },
        ];
        for layout in cases {
            assert!(
                matches!(layout.validate(), Err(BootError::InvalidLayout(_))),
                "{:?} should be rejected",
                layout
            );
        }
    }
}
