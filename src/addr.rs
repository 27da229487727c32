//! Physical address value types
//!
//! The bootloader runs with the MMU off, so every address it touches is a
//! 32-bit physical address. Ranges carry 64-bit ends so a range that reaches
//! the very top of the 4 GiB space is still representable.

use core::fmt;

use crate::error::BootError;

/// Size of the address space reachable from a 32-bit core
pub const ADDRESS_SPACE_END: u64 = 1 << 32;

/// A 32-bit physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PhysAddr(pub u32);

impl PhysAddr {
    /// Raw address value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Address widened for range arithmetic
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    /// Address `offset` bytes further on, if it stays inside 32 bits
    pub fn checked_add(self, offset: u32) -> Option<PhysAddr> {
        self.0.checked_add(offset).map(PhysAddr)
    }

    /// Address `offset` bytes back, if it does not wrap below zero
    pub fn checked_sub(self, offset: u32) -> Option<PhysAddr> {
        self.0.checked_sub(offset).map(PhysAddr)
    }

    /// Round down to a multiple of `align` (a power of two)
    pub const fn align_down(self, align: u32) -> PhysAddr {
        PhysAddr(self.0 & !(align - 1))
    }

    /// Pointer to the byte at this address
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as usize as *mut T
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A half-open span `[start, start + len)` of physical memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysRange {
    start: PhysAddr,
    len: u32,
}

impl PhysRange {
    /// Build a range, rejecting spans that run past the 32-bit address space
    pub fn new(start: PhysAddr, len: u32) -> Result<Self, BootError> {
        if start.as_u64() + len as u64 > ADDRESS_SPACE_END {
            return Err(BootError::AddressOverflow { start, len });
        }
        Ok(Self { start, len })
    }

    /// Build a range from a 64-bit length, as produced by summing sizes
    pub fn with_len(start: PhysAddr, len: u64) -> Result<Self, BootError> {
        let len32 = u32::try_from(len).map_err(|_| BootError::AddressOverflow {
            start,
            len: u32::MAX,
        })?;
        Self::new(start, len32)
    }

    /// Build a range, cutting it short at the top of the address space
    pub fn clamped(start: PhysAddr, len: u64) -> Self {
        let len = len.min(ADDRESS_SPACE_END - start.as_u64());
        Self {
            start,
            len: len.min(u32::MAX as u64) as u32,
        }
    }

    /// First byte of the range
    pub const fn start(&self) -> PhysAddr {
        self.start
    }

    /// Length in bytes
    pub const fn len(&self) -> u32 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte
    pub const fn end(&self) -> u64 {
        self.start.as_u64() + self.len as u64
    }

    /// Whether `addr` falls inside the range
    pub fn contains_addr(&self, addr: PhysAddr) -> bool {
        addr.as_u64() >= self.start.as_u64() && addr.as_u64() < self.end()
    }

    /// Whether `other` lies entirely inside this range
    pub fn contains(&self, other: &PhysRange) -> bool {
        other.start.as_u64() >= self.start.as_u64() && other.end() <= self.end()
    }

    /// Whether the two ranges share at least one byte
    pub fn overlaps(&self, other: &PhysRange) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start.as_u64() < other.end()
            && other.start.as_u64() < self.end()
    }

    /// The part of this range at or after `addr`, empty if `addr` is past the end
    pub fn tail_from(&self, addr: PhysAddr) -> PhysRange {
        let from = addr.as_u64().clamp(self.start.as_u64(), self.end());
        PhysRange {
            start: PhysAddr(from as u32),
            len: (self.end() - from) as u32,
        }
    }
}

impl fmt::Display for PhysRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:x}, 0x{:x})", self.start.0, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_end_reaches_top_of_space() {
        let r = PhysRange::new(PhysAddr(0xffff_f000), 0x1000).unwrap();
        assert_eq!(r.end(), ADDRESS_SPACE_END);
        assert!(PhysRange::new(PhysAddr(0xffff_f000), 0x1001).is_err());
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = PhysRange::new(PhysAddr(0x1000), 0x100).unwrap();
        let b = PhysRange::new(PhysAddr(0x1100), 0x100).unwrap();
        let c = PhysRange::new(PhysAddr(0x10ff), 0x2).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_empty_range_overlaps_nothing() {
        let a = PhysRange::new(PhysAddr(0x1000), 0x100).unwrap();
        let e = PhysRange::new(PhysAddr(0x1010), 0).unwrap();
        assert!(!a.overlaps(&e));
        assert!(a.contains(&e));
    }

    #[test]
    fn test_tail_from() {
        let a = PhysRange::new(PhysAddr(0x1000), 0x100).unwrap();
        let t = a.tail_from(PhysAddr(0x1040));
        assert_eq!(t.start(), PhysAddr(0x1040));
        assert_eq!(t.len(), 0xc0);
        assert!(a.tail_from(PhysAddr(0x2000)).is_empty());
        assert_eq!(a.tail_from(PhysAddr(0x10)), a);
    }

    #[test]
    fn test_align_down() {
        assert_eq!(PhysAddr(0x8ff0_400f).align_down(16), PhysAddr(0x8ff0_4000));
    }
}
