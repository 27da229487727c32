//! Kernel image loader and verifier
//!
//! Loading is a fixed sequence:
//!
//! 1. zero the reserved zone at the top of RAM
//! 2. zero `image + stack + reserved zone` bytes at the load address
//! 3. copy the image forward, byte by byte
//! 4. print a short preview of destination vs source words
//! 5. compare every word (and any trailing bytes) and stop at the first
//!    mismatch
//!
//! All address checks happen up front in [`LoadPlan::new`], so a bad
//! configuration is rejected before a single byte is written.

use core::fmt::{self, Write};

use crate::addr::{PhysAddr, PhysRange};
use crate::error::BootError;
use crate::layout::MemoryLayout;
use crate::mem::PhysMemory;

/// Number of words shown before the full verify pass
pub const PREVIEW_WORDS: u32 = 10;

/// Word size used by the verify pass
const WORD: u32 = 4;

/// The kernel image embedded in the bootloader
#[derive(Debug, Clone, Copy)]
pub struct KernelImage<'a> {
    base: PhysAddr,
    bytes: &'a [u8],
}

impl<'a> KernelImage<'a> {
    /// Describe `bytes`, which live at physical address `base`
    pub fn new(base: PhysAddr, bytes: &'a [u8]) -> Result<Self, BootError> {
        PhysRange::with_len(base, bytes.len() as u64)?;
        Ok(Self { base, bytes })
    }

    /// Describe bytes the running code can address directly
    pub fn resident(bytes: &'a [u8]) -> Result<Self, BootError> {
        let base = u32::try_from(bytes.as_ptr() as usize).map_err(|_| {
            BootError::AddressOverflow {
                start: PhysAddr(u32::MAX),
                len: bytes.len() as u32,
            }
        })?;
        Self::new(PhysAddr(base), bytes)
    }

    pub fn base(&self) -> PhysAddr {
        self.base
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Image size in bytes
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Where the image currently lives
    pub fn span(&self) -> PhysRange {
        PhysRange::clamped(self.base, self.bytes.len() as u64)
    }

    /// Number of whole words in the image
    pub fn word_count(&self) -> u32 {
        self.len() / WORD
    }

    /// Native-endian word `index`
    pub fn word(&self, index: u32) -> u32 {
        let at = (index * WORD) as usize;
        let mut w = [0u8; WORD as usize];
        w.copy_from_slice(&self.bytes[at..at + WORD as usize]);
        u32::from_ne_bytes(w)
    }
}

/// Validated destination ranges for one image under one layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPlan {
    reserved_zone: PhysRange,
    dest_zero: PhysRange,
    image_dest: PhysRange,
    in_place: bool,
}

impl LoadPlan {
    /// Check `image` against `layout` and work out every range to touch
    pub fn new(layout: &MemoryLayout, image: &KernelImage<'_>) -> Result<Self, BootError> {
        layout.validate()?;
        if image.is_empty() {
            return Err(BootError::EmptyImage);
        }
        layout.check_footprint(image.len())?;

        let load = layout.load_addr();
        let image_dest = PhysRange::new(load, image.len())?;
        let zero_len = image.len() as u64
            + layout.stack_size as u64
            + layout.reserved_zone_size as u64;
        let dest_zero = PhysRange::with_len(load, zero_len)?;
        let reserved_zone = layout.reserved_zone();

        let ram = layout.ram();
        for region in [reserved_zone, dest_zero] {
            if !ram.contains(&region) {
                return Err(BootError::OutOfRam(region));
            }
        }

        // Loading in place keeps the image bytes; only what follows is cleared
        let in_place = image.base() == load;
        let dest_zero = if in_place {
            dest_zero.tail_from(PhysAddr(image_dest.end() as u32))
        } else {
            dest_zero
        };

        let plan = Self {
            reserved_zone,
            dest_zero,
            image_dest,
            in_place,
        };
        for region in plan.written_regions() {
            if image.span().overlaps(&region) {
                return Err(BootError::SourceOverlap {
                    image: image.span(),
                    region,
                });
            }
        }
        Ok(plan)
    }

    /// Fail if loading would write into `protected`
    ///
    /// Used for the bootloader's own code, data and stack.
    pub fn protect(&self, protected: PhysRange) -> Result<(), BootError> {
        for region in self.written_regions() {
            if protected.overlaps(&region) {
                return Err(BootError::ProtectedOverlap { protected, region });
            }
        }
        Ok(())
    }

    /// Top-of-RAM zone cleared in step 1
    pub fn reserved_zone(&self) -> PhysRange {
        self.reserved_zone
    }

    /// Destination span cleared in step 2
    pub fn dest_zero(&self) -> PhysRange {
        self.dest_zero
    }

    /// Where the image ends up
    pub fn image_dest(&self) -> PhysRange {
        self.image_dest
    }

    /// Whether the image already sits at the load address
    pub fn is_in_place(&self) -> bool {
        self.in_place
    }

    fn written_regions(&self) -> impl Iterator<Item = PhysRange> {
        let copy = if self.in_place {
            None
        } else {
            Some(self.image_dest)
        };
        [self.reserved_zone, self.dest_zero]
            .into_iter()
            .chain(copy)
    }
}

/// Steps 1 and 2: clear the reserved zone, then the destination span
pub fn zero_regions<M: PhysMemory + ?Sized>(
    plan: &LoadPlan,
    mem: &mut M,
) -> Result<(), BootError> {
    mem.fill(plan.reserved_zone(), 0)?;
    mem.fill(plan.dest_zero(), 0)
}

/// Step 3: forward byte copy to the load address
pub fn copy_image<M: PhysMemory + ?Sized>(
    plan: &LoadPlan,
    image: &KernelImage<'_>,
    mem: &mut M,
) -> Result<(), BootError> {
    if plan.is_in_place() {
        return Ok(());
    }
    mem.write_bytes(plan.image_dest().start(), image.bytes())
}

/// Step 4: show the first words of destination and source side by side
pub fn print_preview<M, W>(
    plan: &LoadPlan,
    image: &KernelImage<'_>,
    mem: &M,
    out: &mut W,
) -> Result<(), BootError>
where
    M: PhysMemory + ?Sized,
    W: Write + ?Sized,
{
    let count = image.word_count().min(PREVIEW_WORDS);
    note(out, format_args!("first {} words are:\n", count));
    for i in 0..count {
        let found = mem.read_u32(word_addr(plan, i))?;
        note(out, format_args!("\t0x{:x} vs 0x{:x}\n", found, image.word(i)));
    }
    Ok(())
}

/// Step 5: compare the destination against the image
///
/// Words are checked in increasing address order, then the 0-3 bytes past
/// the last whole word. The first difference is reported and returned.
pub fn verify_image<M, W>(
    plan: &LoadPlan,
    image: &KernelImage<'_>,
    mem: &M,
    out: &mut W,
) -> Result<(), BootError>
where
    M: PhysMemory + ?Sized,
    W: Write + ?Sized,
{
    note(out, format_args!("verifying: "));

    for i in 0..image.word_count() {
        let addr = word_addr(plan, i);
        let expected = image.word(i);
        let found = mem.read_u32(addr)?;
        if found != expected {
            return Err(mismatch(out, addr, expected, found));
        }
    }

    let dest = plan.image_dest().start();
    for offset in image.word_count() * WORD..image.len() {
        let addr = PhysAddr(dest.0 + offset);
        let expected = image.bytes()[offset as usize] as u32;
        let found = mem.read_u8(addr)? as u32;
        if found != expected {
            return Err(mismatch(out, addr, expected, found));
        }
    }

    note(out, format_args!(" complete!\n"));
    Ok(())
}

/// Zero, copy, preview and verify; returns the number of bytes loaded
pub fn load_and_verify<M, W>(
    plan: &LoadPlan,
    image: &KernelImage<'_>,
    mem: &mut M,
    out: &mut W,
) -> Result<u32, BootError>
where
    M: PhysMemory + ?Sized,
    W: Write + ?Sized,
{
    note(out, format_args!("kernel image size: 0x{:x}\n", image.len()));
    zero_regions(plan, mem)?;
    copy_image(plan, image, mem)?;
    note(out, format_args!("loaded at {}\n", plan.image_dest().start()));
    print_preview(plan, image, mem, out)?;
    verify_image(plan, image, mem, out)?;
    Ok(image.len())
}

fn word_addr(plan: &LoadPlan, index: u32) -> PhysAddr {
    PhysAddr(plan.image_dest().start().0 + index * WORD)
}

fn mismatch<W: Write + ?Sized>(out: &mut W, addr: PhysAddr, expected: u32, found: u32) -> BootError {
    note(out, format_args!("mismatch at address {}\n", addr));
    BootError::VerifyMismatch {
        addr,
        expected,
        found,
    }
}

// Console output is best effort; a failed write must not change the outcome
fn note<W: Write + ?Sized>(out: &mut W, args: fmt::Arguments<'_>) {
    let _ = out.write_fmt(args);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::RamWindow;

    const BASE: u32 = 0x1000_0000;

    fn small_layout() -> MemoryLayout {
        MemoryLayout {
            ram_start: BASE,
            ram_size: 0x1_0000,
            reserved_zone_size: 0x1000,
            kernel_load_addr: BASE,
            stack_size: 0x400,
        }
    }

    #[test]
    fn test_plan_ranges() {
        let bytes = [0u8; 0x100];
        let image = KernelImage::new(PhysAddr(0x2000_0000), &bytes).unwrap();
        let plan = LoadPlan::new(&small_layout(), &image).unwrap();

        assert_eq!(plan.reserved_zone().start(), PhysAddr(0x1000_f000));
        assert_eq!(plan.reserved_zone().len(), 0x1000);
        assert_eq!(plan.dest_zero().start(), PhysAddr(BASE));
        assert_eq!(plan.dest_zero().len(), 0x100 + 0x400 + 0x1000);
        assert_eq!(plan.image_dest().len(), 0x100);
        assert!(!plan.is_in_place());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let image = KernelImage::new(PhysAddr(0x2000_0000), &[]).unwrap();
        assert_eq!(
            LoadPlan::new(&small_layout(), &image),
            Err(BootError::EmptyImage)
        );
    }

    #[test]
    fn test_overlapping_source_is_rejected() {
        let bytes = [0u8; 0x100];
        // Source sits inside the stack area that step 2 clears
        let image = KernelImage::new(PhysAddr(BASE + 0x200), &bytes).unwrap();
        assert!(matches!(
            LoadPlan::new(&small_layout(), &image),
            Err(BootError::SourceOverlap { .. })
        ));
    }

    #[test]
    fn test_in_place_load_keeps_image() {
        let mut ram = [0x55u8; 0x1_0000];
        ram[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let source = ram[..8].to_vec();

        let image = KernelImage::new(PhysAddr(BASE), &source).unwrap();
        let plan = LoadPlan::new(&small_layout(), &image).unwrap();
        assert!(plan.is_in_place());
        assert_eq!(plan.dest_zero().start(), PhysAddr(BASE + 8));

        let mut win = RamWindow::new(PhysAddr(BASE), &mut ram).unwrap();
        let mut out: heapless::String<512> = heapless::String::new();
        assert_eq!(load_and_verify(&plan, &image, &mut win, &mut out), Ok(8));
        assert_eq!(win.slice(plan.image_dest()).unwrap(), &source[..]);
        assert!(win.slice(plan.dest_zero()).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_protect_detects_bootloader_overlap() {
        let bytes = [0u8; 0x100];
        let image = KernelImage::new(PhysAddr(0x2000_0000), &bytes).unwrap();
        let plan = LoadPlan::new(&small_layout(), &image).unwrap();

        let outside = PhysRange::new(PhysAddr(0x3000_0000), 0x8000).unwrap();
        assert!(plan.protect(outside).is_ok());

        let inside = PhysRange::new(PhysAddr(0x1000_f800), 0x100).unwrap();
        assert_eq!(
            plan.protect(inside),
            Err(BootError::ProtectedOverlap {
                protected: inside,
                region: plan.reserved_zone(),
            })
        );
    }

    #[test]
    fn test_trailing_bytes_are_verified() {
        let bytes = [0x11u8, 0x22, 0x33, 0x44, 0x55, 0x66];
        let image = KernelImage::new(PhysAddr(0x2000_0000), &bytes).unwrap();
        let plan = LoadPlan::new(&small_layout(), &image).unwrap();

        let mut ram = [0u8; 0x1_0000];
        let mut win = RamWindow::new(PhysAddr(BASE), &mut ram).unwrap();
        zero_regions(&plan, &mut win).unwrap();
        copy_image(&plan, &image, &mut win).unwrap();
        win.write_bytes(PhysAddr(BASE + 5), &[0]).unwrap();

        let mut out: heapless::String<256> = heapless::String::new();
        assert_eq!(
            verify_image(&plan, &image, &win, &mut out),
            Err(BootError::VerifyMismatch {
                addr: PhysAddr(BASE + 5),
                expected: 0x66,
                found: 0,
            })
        );
        assert!(out.ends_with("mismatch at address 0x10000005\n"));
    }

    #[test]
    fn test_preview_is_capped() {
        let bytes = [0xabu8; 12];
        let image = KernelImage::new(PhysAddr(0x2000_0000), &bytes).unwrap();
        let plan = LoadPlan::new(&small_layout(), &image).unwrap();

        let mut ram = [0u8; 0x1_0000];
        let mut win = RamWindow::new(PhysAddr(BASE), &mut ram).unwrap();
        copy_image(&plan, &image, &mut win).unwrap();

        let mut out: heapless::String<256> = heapless::String::new();
        print_preview(&plan, &image, &win, &mut out).unwrap();
        assert!(out.starts_with("first 3 words are:\n"));
        assert_eq!(out.matches("\t0xabababab vs 0xabababab\n").count(), 3);
    }
}
