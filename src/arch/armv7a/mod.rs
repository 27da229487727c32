//! ARMv7-A (Cortex-A9) support

pub mod arch_impl;
pub mod vectors;

// Re-export things from arch_impl for convenience
pub use arch_impl::*;
