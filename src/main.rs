//! Biscuit-ARM bootloader binary
//!
//! Embeds the kernel named by `BISCUIT_KERNEL_IMAGE` at build time. On the
//! board, `_start` (in the library's vector code) sets up stacks and calls
//! `boot_main`; built for the host, the binary only reports what it would
//! hand to the kernel.

#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_std, no_main)]

/// Keeps the embedded image word aligned
#[repr(C, align(4))]
struct Aligned<B: ?Sized>(B);

static KERNEL_IMAGE: &Aligned<[u8]> = &Aligned(*include_bytes!(env!("BISCUIT_KERNEL_IMAGE")));

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod entry {
    use core::panic::PanicInfo;
    use core::ptr::addr_of;

    use biscuit_boot::addr::{PhysAddr, PhysRange};
    use biscuit_boot::error::BootError;
    use biscuit_boot::handoff::HandoffParams;
    use biscuit_boot::layout::MemoryLayout;
    use biscuit_boot::loader::KernelImage;
    use biscuit_boot::mem::RawMemory;
    use biscuit_boot::{arch, boot, console, println};

    use super::KERNEL_IMAGE;

    extern "C" {
        static __boot_start: u8;
        static __boot_end: u8;
    }

    /// The bootloader's own image, stacks and `.bss`
    fn boot_span() -> Result<PhysRange, BootError> {
        let (start, end) = unsafe { (addr_of!(__boot_start) as u32, addr_of!(__boot_end) as u32) };
        PhysRange::with_len(PhysAddr(start), end.saturating_sub(start) as u64)
    }

    fn prepare(layout: &MemoryLayout) -> Result<HandoffParams, BootError> {
        let image = KernelImage::resident(&KERNEL_IMAGE.0)?;
        // SAFETY: runs before the kernel; the loader owns RAM
        let mut mem = unsafe { RawMemory::new(layout.ram()) };
        let params = boot::run(layout, &image, Some(boot_span()?), &mut mem, &mut console::Serial)?;
        arch::clean_dcache_to_pou(PhysRange::new(params.entry, image.len())?);
        Ok(params)
    }

    #[no_mangle]
    extern "C" fn boot_main() -> ! {
        console::init();
        println!("{}", boot::BANNER);

        let params = match prepare(boot::layout()) {
            Ok(params) => params,
            Err(err @ BootError::VerifyMismatch { .. }) => panic!("verify failed: {}", err),
            Err(err) => panic!("boot failed: {}", err),
        };

        // SAFETY: the image is loaded, verified and cleaned to the PoU
        unsafe { arch::enter_kernel(&params) }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        biscuit_boot::panic::boot_panic(info)
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn main() {
    use biscuit_boot::handoff::HandoffParams;
    use biscuit_boot::{boot, NAME, VERSION};

    println!("{} {}", NAME, VERSION);
    println!("embedded kernel image: {} bytes", KERNEL_IMAGE.0.len());
    let size = KERNEL_IMAGE.0.len() as u32;
    match HandoffParams::compute(boot::layout(), size) {
        Ok(params) => println!("hand-off would be {}", params),
        Err(err) => println!("no valid hand-off: {}", err),
    }
    println!("build for armv7a-none-eabi to boot it (cargo xtask build)");
}
