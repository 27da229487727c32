//! Reset entry and exception vectors
//!
//! `_start` is where the first-stage loader jumps. It masks interrupts,
//! gives every exception mode its own stack, points VBAR at `__vectors`,
//! clears `.bss` and calls `boot_main` on the boot stack.
//!
//! Each vector stub pushes `r0`..`r12` on its mode's stack, fetches the
//! interrupted SVC stack pointer, and hands `__trap_common` the cause code
//! in `r0` and that `sp` in `r1`. `__trap_common` completes a [`TrapFrame`]
//! (cause, `lr`, `sp`, `r0`..`r12`, lowest address first) and passes its
//! address to [`handle_trap_entry`].

use core::arch::global_asm;

use crate::trap::{self, TrapFrame};

// Mode numbers (CPSR.M)
// FIQ 0x11, IRQ 0x12, SVC 0x13, ABT 0x17, UND 0x1b
global_asm!(
    r#"
    .arm

    .section .text.vectors, "ax"
    .align 5
    .global __vectors
__vectors:
    b _start
    b __vec_undef
    b __vec_svc
    b __vec_pabt
    b __vec_dabt
    b .
    b __vec_irq
    b __vec_fiq

    .section .text.boot, "ax"
    .global _start
_start:
    cpsid if

    ldr r0, =__trap_stack_top
    cps #0x1b
    mov sp, r0
    sub r0, r0, #0x400
    cps #0x17
    mov sp, r0
    sub r0, r0, #0x400
    cps #0x12
    mov sp, r0
    sub r0, r0, #0x400
    cps #0x11
    mov sp, r0

    cps #0x13
    ldr sp, =__boot_stack_top

    ldr r0, =__vectors
    mcr p15, 0, r0, c12, c0, 0
    mrc p15, 0, r0, c1, c0, 0
    bic r0, r0, #(1 << 13)
    mcr p15, 0, r0, c1, c0, 0
    isb

    ldr r0, =__bss_start
    ldr r1, =__bss_end
    mov r2, #0
1:
    cmp r0, r1
    strlo r2, [r0], #4
    blo 1b

    mov fp, #0
    bl boot_main
2:
    wfi
    b 2b

__vec_undef:
    push {{r0-r12}}
    cps #0x13
    mov r1, sp
    cps #0x1b
    mov r0, #1
    b __trap_common

__vec_svc:
    push {{r0-r12}}
    add r1, sp, #52
    mov r0, #2
    b __trap_common

__vec_pabt:
    push {{r0-r12}}
    cps #0x13
    mov r1, sp
    cps #0x17
    mov r0, #3
    b __trap_common

__vec_dabt:
    push {{r0-r12}}
    cps #0x13
    mov r1, sp
    cps #0x17
    mov r0, #4
    b __trap_common

__vec_irq:
    push {{r0-r12}}
    cps #0x13
    mov r1, sp
    cps #0x12
    mov r0, #5
    b __trap_common

__vec_fiq:
    push {{r0-r12}}
    cps #0x13
    mov r1, sp
    cps #0x11
    mov r0, #6
    b __trap_common

__trap_common:
    push {{r1}}
    push {{lr}}
    push {{r0}}
    mov r0, sp
    bl handle_trap_entry
3:
    b 3b

    .ltorg
"#
);

/// Called by `__trap_common` with the frame it built on the exception stack
#[no_mangle]
extern "C" fn handle_trap_entry(frame: &TrapFrame) -> ! {
    trap::handle_trap(frame)
}
