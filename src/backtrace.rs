//! Frame-pointer stack walk
//!
//! Follows the APCS frame chain: at a frame pointer `fp`, the word at
//! `fp - 4` is the saved return address and the word at `fp - 12` is the
//! caller's frame pointer. A zero frame pointer ends the chain.
//!
//! Precondition: the trapping code ran with frame pointers and had already
//! built its frame (`-mapcs-frame` / `-C force-frame-pointers=yes`). A trap
//! taken inside a prologue, or in code without frame pointers, leaves `fp`
//! holding an unrelated value and the walk reports garbage. The walk does
//! stop after [`MAX_FRAMES`] frames or at an address outside RAM.

use core::fmt::{self, Write};

use crate::addr::PhysAddr;
use crate::mem::PhysMemory;

/// Longest chain the walk follows
pub const MAX_FRAMES: usize = 32;

/// Offset from `fp` of the saved return address
const LR_OFFSET: u32 = 4;
/// Offset from `fp` of the caller's frame pointer
const CALLER_FP_OFFSET: u32 = 12;

/// One frame of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    /// Frame pointer of this frame
    pub fp: PhysAddr,
    /// Return address saved in it
    pub lr: u32,
}

/// Iterator over the frames reachable from a frame pointer
pub struct FrameChain<'m, M: PhysMemory + ?Sized> {
    mem: &'m M,
    fp: u32,
    walked: usize,
}

impl<'m, M: PhysMemory + ?Sized> FrameChain<'m, M> {
    pub fn new(fp: u32, mem: &'m M) -> Self {
        Self { mem, fp, walked: 0 }
    }

    fn read(&self, offset: u32) -> Option<u32> {
        let addr = PhysAddr(self.fp).checked_sub(offset)?;
        self.mem.read_u32(addr).ok()
    }
}

impl<M: PhysMemory + ?Sized> Iterator for FrameChain<'_, M> {
    type Item = StackFrame;

    fn next(&mut self) -> Option<StackFrame> {
        if self.fp == 0 || self.walked >= MAX_FRAMES {
            return None;
        }
        let (Some(lr), Some(caller)) = (self.read(LR_OFFSET), self.read(CALLER_FP_OFFSET))
        else {
            self.fp = 0;
            return None;
        };
        let frame = StackFrame {
            fp: PhysAddr(self.fp),
            lr,
        };
        self.fp = caller;
        self.walked += 1;
        Some(frame)
    }
}

/// Collect the chain into a fixed-capacity list
pub fn collect<M: PhysMemory + ?Sized>(fp: u32, mem: &M) -> heapless::Vec<StackFrame, MAX_FRAMES> {
    // The iterator never yields more than MAX_FRAMES items
    FrameChain::new(fp, mem).collect()
}

/// Print every frame of the chain
pub fn report<M, W>(fp: u32, mem: &M, out: &mut W) -> fmt::Result
where
    M: PhysMemory + ?Sized,
    W: Write + ?Sized,
{
    writeln!(out, "backtrace:")?;
    for frame in FrameChain::new(fp, mem) {
        writeln!(out, "\t|stack frame at {}, lr=0x{:x}", frame.fp, frame.lr)?;
    }
    writeln!(out, "backtrace done")
}
