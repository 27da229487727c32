//! Build script for the Biscuit-ARM bootloader
//!
//! Points `BISCUIT_KERNEL_IMAGE` at the kernel to embed (an empty
//! placeholder when unset) and passes the linker script for bare-metal
//! ARM builds.

use std::env;
use std::fs;
use std::path::PathBuf;

const LINKER_SCRIPT: &str = "linker/armv7a.ld";

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed={}", LINKER_SCRIPT);
    println!("cargo:rerun-if-env-changed=BISCUIT_KERNEL_IMAGE");

    match env::var("BISCUIT_KERNEL_IMAGE") {
        Ok(path) => {
            let image = PathBuf::from(&path);
            let image = if image.is_absolute() {
                image
            } else {
                PathBuf::from(&manifest_dir).join(image)
            };
            println!("cargo:rerun-if-changed={}", image.display());
            println!("cargo:rustc-env=BISCUIT_KERNEL_IMAGE={}", image.display());
        }
        Err(_) => {
            let placeholder = out_dir.join("kernel.placeholder.bin");
            fs::write(&placeholder, b"").unwrap_or_else(|e| {
                panic!("Failed to write {}: {}", placeholder.display(), e);
            });
            println!(
                "cargo:warning=BISCUIT_KERNEL_IMAGE not set; embedding an empty kernel image"
            );
            println!("cargo:rustc-env=BISCUIT_KERNEL_IMAGE={}", placeholder.display());
        }
    }

    // Only use the custom linker script for bare-metal builds
    if arch == "arm" && os == "none" {
        println!("cargo:rustc-link-arg-bins=-T{}/{}", manifest_dir, LINKER_SCRIPT);
    }
}
