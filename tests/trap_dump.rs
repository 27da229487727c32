//! Trap classification and dump layout

use biscuit_boot::trap::{self, Diagnosis, TrapCause, TrapFrame, REGISTER_LABELS};

fn frame(cause: u32) -> TrapFrame {
    TrapFrame {
        cause,
        lr: 0x1000_0100,
        sp: 0x8ff0_3f00,
        gpr: [0xdead_0000; 13],
    }
}

#[test]
fn test_each_cause_prints_its_message_once() {
    let table = [
        (1, TrapCause::Undefined, "undefined trap"),
        (2, TrapCause::SupervisorCall, "svc from addr 0x100000fc"),
        (3, TrapCause::PrefetchAbort, "prefetch abort"),
        (4, TrapCause::DataAbort, "data abort from addr 0x100000f8"),
        (5, TrapCause::Irq, "irq trap"),
        (6, TrapCause::Fiq, "fiq trap"),
    ];

    for (code, cause, message) in table {
        let f = frame(code);
        assert_eq!(f.cause(), cause);
        assert_eq!(Diagnosis(&f).to_string(), message);

        let mut out = String::new();
        trap::report(&f, 0, &mut out).unwrap();
        assert_eq!(out.matches(message).count(), 1, "cause {}", code);
        assert_eq!(out.lines().count(), 2 + REGISTER_LABELS.len());
    }
}

#[test]
fn test_labels_are_stable() {
    let mut out = String::new();
    trap::report(&frame(1), 0x00c5_0078, &mut out).unwrap();

    let labels: Vec<&str> = out
        .lines()
        .skip(2)
        .map(|line| line.trim_start_matches("\t ").split(':').next().unwrap())
        .collect();
    assert_eq!(labels, REGISTER_LABELS);
    assert!(out.lines().all(|line| line.len() < 40));
}
