//! Property tests for the waitlist state machine.
//!
//! Arbitrary sequences of transitions must keep the four lists disjoint and
//! within capacity.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use proptest::prelude::*;
use waitlist_lottery_core::{EntrantId, ListKind, Waitlist};

#[derive(Clone, Debug)]
enum Op {
    Register(u8),
    Select(u8),
    Cancel(u8),
    Confirm(u8),
    Leave(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Small id space so operations collide often
    let id = 0u8..8;
    prop_oneof![
        id.clone().prop_map(Op::Register),
        id.clone().prop_map(Op::Select),
        id.clone().prop_map(Op::Cancel),
        id.clone().prop_map(Op::Confirm),
        id.prop_map(Op::Leave),
    ]
}

fn entrant(n: u8) -> EntrantId {
    EntrantId::new(format!("e{n}"))
}

fn total_entrants(waitlist: &Waitlist) -> usize {
    ListKind::ALL
        .into_iter()
        .map(|kind| waitlist.list(kind).len())
        .sum()
}

proptest! {
    #[test]
    fn transitions_preserve_invariants(
        capacity in 0u32..5,
        ops in prop::collection::vec(op_strategy(), 0..64),
    ) {
        let mut waitlist = Waitlist::new(capacity);
        let mut registered = std::collections::HashSet::new();

        for op in ops {
            match op {
                Op::Register(n) => {
                    if waitlist.add_entrant_to_waitlist(entrant(n)) {
                        registered.insert(n);
                    }
                },
                Op::Select(n) => {
                    waitlist.move_to_selected(&entrant(n));
                },
                Op::Cancel(n) => {
                    waitlist.move_to_cancelled(&entrant(n));
                },
                Op::Confirm(n) => {
                    waitlist.add_to_confirmed(&entrant(n));
                },
                Op::Leave(n) => {
                    if waitlist.leave_waitlist(&entrant(n)) {
                        registered.remove(&n);
                    }
                },
            }

            prop_assert!(waitlist.check_invariants().is_ok());
            prop_assert!(waitlist.selected_list().len() <= capacity as usize);
            // Entrants are never fabricated or lost, only removed by leaving
            prop_assert_eq!(total_entrants(&waitlist), registered.len());
        }
    }

    #[test]
    fn double_enqueue_keeps_single_entry(n in 0u8..8) {
        let mut waitlist = Waitlist::new(1);
        waitlist.add_entrant_to_waitlist(entrant(n));
        waitlist.add_entrant_to_waitlist(entrant(n));

        let count = waitlist
            .waiting_list()
            .iter()
            .filter(|e| **e == entrant(n))
            .count();
        prop_assert_eq!(count, 1);
    }
}
