//! Proptest strategies for kernel images and corruptions

use proptest::prelude::*;

/// Kernel image contents, never empty
pub fn image_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..4096)
}

/// An image plus one byte offset inside it
pub fn image_with_offset() -> impl Strategy<Value = (Vec<u8>, usize)> {
    image_bytes().prop_flat_map(|bytes| {
        let len = bytes.len();
        (Just(bytes), 0..len)
    })
}

/// Cause codes no vector stub produces
pub fn unknown_cause() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0u32), 7u32..=u32::MAX]
}

/// Register file contents
pub fn registers() -> impl Strategy<Value = [u32; 13]> {
    prop::array::uniform13(any::<u32>())
}
