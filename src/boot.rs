//! The boot sequence
//!
//! Plan the load, check it against the bootloader's own footprint, zero,
//! copy and verify the kernel, then work out the hand-off. Everything up to
//! the jump itself returns a `Result`; the caller decides to halt.

use core::fmt::Write;

use spin::Once;

use crate::addr::PhysRange;
use crate::error::BootError;
use crate::handoff::HandoffParams;
use crate::layout::MemoryLayout;
use crate::loader::{self, KernelImage, LoadPlan};
use crate::mem::PhysMemory;

/// Banner printed once the console is up
pub const BANNER: &str = "Welcome to Biscuit-ARM Bootloader";

static LAYOUT: Once<MemoryLayout> = Once::new();

/// The layout this boot uses, fixed on first access
pub fn layout() -> &'static MemoryLayout {
    LAYOUT.call_once(MemoryLayout::platform)
}

/// Load `image` and compute the kernel hand-off
///
/// `protected` is memory the sequence must leave untouched, normally the
/// bootloader's own image and stacks.
pub fn run<M, W>(
    layout: &MemoryLayout,
    image: &KernelImage<'_>,
    protected: Option<PhysRange>,
    mem: &mut M,
    out: &mut W,
) -> Result<HandoffParams, BootError>
where
    M: PhysMemory + ?Sized,
    W: Write + ?Sized,
{
    let _ = writeln!(
        out,
        "[BOOT] ram {} reserved {} load {}",
        layout.ram(),
        layout.reserved_zone(),
        layout.load_addr()
    );

    let plan = LoadPlan::new(layout, image)?;
    if let Some(range) = protected {
        plan.protect(range)?;
    }
    if plan.is_in_place() {
        let _ = writeln!(out, "[BOOT] image already at {}, not copying", image.base());
    }

    let size = loader::load_and_verify(&plan, image, mem, out)?;
    let params = HandoffParams::compute(layout, size)?;
    let _ = writeln!(out, "[BOOT] hand-off {}", params);
    Ok(params)
}
