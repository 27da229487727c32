//! Property-based tests for the loader, hand-off and trap dump

mod proptest_strategies;

use biscuit_boot::addr::{PhysAddr, PhysRange};
use biscuit_boot::error::BootError;
use biscuit_boot::handoff::HandoffParams;
use biscuit_boot::layout::MemoryLayout;
use biscuit_boot::loader::{self, KernelImage, LoadPlan};
use biscuit_boot::mem::{PhysMemory, RamWindow};
use biscuit_boot::trap::{self, TrapFrame};
use proptest::prelude::*;
use proptest_strategies::*;

const BASE: u32 = 0x1000_0000;
const SOURCE: u32 = 0x7000_0000;

fn layout() -> MemoryLayout {
    MemoryLayout {
        ram_start: BASE,
        ram_size: 0x4_0000,
        reserved_zone_size: 0x1_0000,
        kernel_load_addr: BASE,
        stack_size: 0x4000,
    }
}

fn fresh_ram(fill: u8) -> Vec<u8> {
    vec![fill; layout().ram_size as usize]
}

fn render(frame: &TrapFrame) -> String {
    let mut out = String::new();
    trap::report(frame, 0x00c5_0078, &mut out).unwrap();
    out
}

// ════════════════════════════════════════════════════════════
// Loader Property Tests
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The destination holds the image byte for byte
    #[test]
    fn copy_is_exact(bytes in image_bytes(), garbage in any::<u8>()) {
        let layout = layout();
        let image = KernelImage::new(PhysAddr(SOURCE), &bytes).unwrap();
        let plan = LoadPlan::new(&layout, &image).unwrap();
        let mut ram = fresh_ram(garbage);
        let mut mem = RamWindow::new(PhysAddr(BASE), &mut ram).unwrap();

        let loaded = loader::load_and_verify(&plan, &image, &mut mem, &mut String::new());
        prop_assert_eq!(loaded, Ok(bytes.len() as u32));
        prop_assert_eq!(mem.slice(plan.image_dest()).unwrap(), &bytes[..]);
    }

    /// Everything past the image up to stack + reserved zone is zero
    #[test]
    fn tail_is_zeroed(bytes in image_bytes(), garbage in 1u8..) {
        let layout = layout();
        let image = KernelImage::new(PhysAddr(SOURCE), &bytes).unwrap();
        let plan = LoadPlan::new(&layout, &image).unwrap();
        let mut ram = fresh_ram(garbage);
        let mut mem = RamWindow::new(PhysAddr(BASE), &mut ram).unwrap();

        loader::zero_regions(&plan, &mut mem).unwrap();
        loader::copy_image(&plan, &image, &mut mem).unwrap();

        let n = bytes.len() as u32;
        let tail = PhysRange::new(
            PhysAddr(BASE + n),
            layout.stack_size + layout.reserved_zone_size,
        )
        .unwrap();
        prop_assert!(mem.slice(tail).unwrap().iter().all(|&b| b == 0));
        prop_assert!(mem.slice(layout.reserved_zone()).unwrap().iter().all(|&b| b == 0));
    }

    /// A single corrupted byte is reported at its word, or at the byte in the tail
    #[test]
    fn first_mismatch_is_reported((bytes, offset) in image_with_offset(), flip in 1u8..) {
        let layout = layout();
        let image = KernelImage::new(PhysAddr(SOURCE), &bytes).unwrap();
        let plan = LoadPlan::new(&layout, &image).unwrap();
        let mut ram = fresh_ram(0);
        let mut mem = RamWindow::new(PhysAddr(BASE), &mut ram).unwrap();

        loader::zero_regions(&plan, &mut mem).unwrap();
        loader::copy_image(&plan, &image, &mut mem).unwrap();
        let hit = PhysAddr(BASE + offset as u32);
        mem.write_bytes(hit, &[bytes[offset] ^ flip]).unwrap();

        let whole = bytes.len() / 4 * 4;
        let expected = if offset < whole {
            PhysAddr(BASE + (offset as u32 & !3))
        } else {
            hit
        };
        let mut out = String::new();
        let err = loader::verify_image(&plan, &image, &mem, &mut out).unwrap_err();
        prop_assert!(
            matches!(err, BootError::VerifyMismatch { addr, .. } if addr == expected),
            "got {:?}, wanted mismatch at {}",
            err,
            expected
        );
        let wanted = format!("mismatch at address {}\n", expected);
        prop_assert!(out.ends_with(&wanted));
    }

    /// Two loads of the same image leave the same bytes and hand-off
    #[test]
    fn loading_is_repeatable(bytes in image_bytes(), a in any::<u8>(), b in any::<u8>()) {
        let layout = layout();
        let image = KernelImage::new(PhysAddr(SOURCE), &bytes).unwrap();
        let plan = LoadPlan::new(&layout, &image).unwrap();

        let run = |fill: u8| {
            let mut ram = fresh_ram(fill);
            let mut mem = RamWindow::new(PhysAddr(BASE), &mut ram).unwrap();
            let size = loader::load_and_verify(&plan, &image, &mut mem, &mut String::new()).unwrap();
            let params = HandoffParams::compute(&layout, size).unwrap();
            let span = PhysRange::with_len(PhysAddr(BASE), plan.dest_zero().end() - BASE as u64)
                .unwrap();
            (mem.slice(span).unwrap().to_vec(), params)
        };

        prop_assert_eq!(run(a), run(b));
    }
}

// ════════════════════════════════════════════════════════════
// Hand-off Property Tests
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// r0/r1 are the load address and image + stack
    #[test]
    fn handoff_args(size in 1u32..=(u32::MAX - 0x4000)) {
        let layout = MemoryLayout::platform();
        let params = HandoffParams::compute(&layout, size).unwrap();
        prop_assert_eq!(params.args(), (0x1000_0000, size + 0x4000));
        prop_assert_eq!(params.stack_top.as_u32() % 16, 0);
    }
}

// ════════════════════════════════════════════════════════════
// Trap Dump Property Tests
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Unknown causes still print the code and the full dump
    #[test]
    fn unknown_cause_dumps_everything(cause in unknown_cause(), gpr in registers(), lr in any::<u32>(), sp in any::<u32>()) {
        let frame = TrapFrame { cause, lr, sp, gpr };
        let out = render(&frame);
        let lines: Vec<&str> = out.lines().collect();

        prop_assert_eq!(lines.len(), 18);
        let heading = format!("unknown trap {}", cause);
        prop_assert_eq!(lines[0], heading.as_str());
        for (i, value) in gpr.iter().enumerate() {
            let line = format!("\t r{}: 0x{:x}", i, value);
            prop_assert_eq!(lines[2 + i], line.as_str());
        }
        let sp_line = format!("\t sp: 0x{:x}", sp);
        prop_assert_eq!(lines[17], sp_line.as_str());
    }

    /// The data abort address is lr - 8
    #[test]
    fn data_abort_address(lr in any::<u32>()) {
        let frame = TrapFrame { cause: 4, lr, ..TrapFrame::default() };
        let out = render(&frame);
        let heading = format!("data abort from addr 0x{:x}", lr.wrapping_sub(8));
        prop_assert_eq!(out.lines().next(), Some(heading.as_str()));
    }
}
