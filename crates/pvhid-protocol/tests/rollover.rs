//! Property tests for the keyboard rollover array.

use proptest::prelude::*;
use pvhid_protocol::report::KeyboardReport;

fn assert_invariants(report: &KeyboardReport) {
    // No usage occupies two slots.
    for (i, &a) in report.keys.iter().enumerate() {
        if a == 0 {
            continue;
        }
        for &b in &report.keys[i + 1..] {
            assert_ne!(a, b, "duplicate usage {a:#04x} in {:?}", report.keys);
        }
    }
    // Dense: no empty slot before an occupied one.
    let mut seen_empty = false;
    for &slot in &report.keys {
        if slot == 0 {
            seen_empty = true;
        } else {
            assert!(!seen_empty, "gap before {slot:#04x} in {:?}", report.keys);
        }
    }
}

proptest! {
    #[test]
    fn array_stays_dense_and_duplicate_free(
        ops in prop::collection::vec((1u8..=101, any::<bool>()), 0..64)
    ) {
        let mut report = KeyboardReport::new();
        for (usage, pressed) in ops {
            report.set_key(usage, pressed);
            assert_invariants(&report);
        }
    }

    #[test]
    fn release_of_held_key_always_removes_it(
        held in prop::collection::btree_set(1u8..=101, 1..6),
    ) {
        let mut report = KeyboardReport::new();
        for &usage in &held {
            report.set_key(usage, true);
        }
        for &usage in &held {
            assert!(report.set_key(usage, false));
            assert!(!report.keys.contains(&usage));
            assert_invariants(&report);
        }
    }
}
