//! Physical memory access
//!
//! [`PhysMemory`] is the seam between the loader logic and the hardware.
//! On the board, [`RawMemory`] writes through raw pointers inside a
//! bounded RAM range. [`RamWindow`] backs a range of "physical" addresses
//! with an ordinary byte slice, which is what the tests drive.

use crate::addr::{PhysAddr, PhysRange};
use crate::error::BootError;

/// Byte-addressed access to physical memory
///
/// Every operation checks that the touched addresses belong to the memory
/// the implementation manages and fails with [`BootError::OutOfRam`]
/// otherwise, before touching anything.
pub trait PhysMemory {
    /// The range of addresses this memory covers
    fn span(&self) -> PhysRange;

    /// Store `value` into every byte of `range`, lowest address first
    fn fill(&mut self, range: PhysRange, value: u8) -> Result<(), BootError>;

    /// Copy `src` to `dst`, one byte at a time in increasing address order
    fn write_bytes(&mut self, dst: PhysAddr, src: &[u8]) -> Result<(), BootError>;

    /// Read one byte
    fn read_u8(&self, addr: PhysAddr) -> Result<u8, BootError>;

    /// Read one native-endian 32-bit word; `addr` need not be aligned
    fn read_u32(&self, addr: PhysAddr) -> Result<u32, BootError> {
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.read_u8(PhysAddr(addr.0.wrapping_add(i as u32)))?;
        }
        Ok(u32::from_ne_bytes(bytes))
    }

    /// Fail unless `range` lies inside [`PhysMemory::span`]
    fn check(&self, range: PhysRange) -> Result<(), BootError> {
        if self.span().contains(&range) {
            Ok(())
        } else {
            Err(BootError::OutOfRam(range))
        }
    }
}

/// Direct access to physical RAM
pub struct RawMemory {
    ram: PhysRange,
}

impl RawMemory {
    /// Create an accessor for `ram`
    ///
    /// # Safety
    ///
    /// `ram` must be real, identity-mapped memory that nothing else is using
    /// while this accessor writes to it (single core, no DMA), and it must not
    /// contain the running code, its stack, or any Rust object still in use.
    /// Callers exclude those spans with the loader's protection checks.
    pub const unsafe fn new(ram: PhysRange) -> Self {
        Self { ram }
    }
}

impl PhysMemory for RawMemory {
    fn span(&self) -> PhysRange {
        self.ram
    }

    fn fill(&mut self, range: PhysRange, value: u8) -> Result<(), BootError> {
        self.check(range)?;
        let base: *mut u8 = range.start().as_mut_ptr();
        for i in 0..range.len() as usize {
            // SAFETY: in RAM per `check`; exclusivity per `new`'s contract
            unsafe { base.add(i).write_volatile(value) };
        }
        Ok(())
    }

    fn write_bytes(&mut self, dst: PhysAddr, src: &[u8]) -> Result<(), BootError> {
        let range = PhysRange::with_len(dst, src.len() as u64)?;
        self.check(range)?;
        let base: *mut u8 = dst.as_mut_ptr();
        for (i, &byte) in src.iter().enumerate() {
            // SAFETY: as in `fill`
            unsafe { base.add(i).write_volatile(byte) };
        }
        Ok(())
    }

    fn read_u8(&self, addr: PhysAddr) -> Result<u8, BootError> {
        self.check(PhysRange::new(addr, 1)?)?;
        // SAFETY: in RAM per `check`
        Ok(unsafe { addr.as_mut_ptr::<u8>().read_volatile() })
    }

    fn read_u32(&self, addr: PhysAddr) -> Result<u32, BootError> {
        self.check(PhysRange::new(addr, 4)?)?;
        // SAFETY: in RAM per `check`; unaligned reads are split by the compiler
        Ok(unsafe { addr.as_mut_ptr::<u32>().read_unaligned() })
    }
}

/// A byte slice standing in for physical memory at `base`
pub struct RamWindow<'a> {
    base: PhysAddr,
    bytes: &'a mut [u8],
}

impl<'a> RamWindow<'a> {
    /// Map `bytes` at physical address `base`
    pub fn new(base: PhysAddr, bytes: &'a mut [u8]) -> Result<Self, BootError> {
        PhysRange::with_len(base, bytes.len() as u64)?;
        Ok(Self { base, bytes })
    }

    /// Bytes of `range`, which must lie inside the window
    pub fn slice(&self, range: PhysRange) -> Result<&[u8], BootError> {
        let (from, to) = self.offsets(range)?;
        Ok(&self.bytes[from..to])
    }

    /// Mutable bytes of `range`, which must lie inside the window
    pub fn slice_mut(&mut self, range: PhysRange) -> Result<&mut [u8], BootError> {
        let (from, to) = self.offsets(range)?;
        Ok(&mut self.bytes[from..to])
    }

    fn offsets(&self, range: PhysRange) -> Result<(usize, usize), BootError> {
        self.check(range)?;
        let from = (range.start().as_u64() - self.base.as_u64()) as usize;
        Ok((from, from + range.len() as usize))
    }
}

impl PhysMemory for RamWindow<'_> {
    fn span(&self) -> PhysRange {
        PhysRange::clamped(self.base, self.bytes.len() as u64)
    }

    fn fill(&mut self, range: PhysRange, value: u8) -> Result<(), BootError> {
        self.slice_mut(range)?.fill(value);
        Ok(())
    }

    fn write_bytes(&mut self, dst: PhysAddr, src: &[u8]) -> Result<(), BootError> {
        let range = PhysRange::with_len(dst, src.len() as u64)?;
        self.slice_mut(range)?.copy_from_slice(src);
        Ok(())
    }

    fn read_u8(&self, addr: PhysAddr) -> Result<u8, BootError> {
        Ok(self.slice(PhysRange::new(addr, 1)?)?[0])
    }
}
