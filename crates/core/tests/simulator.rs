//! End-to-end tests of the out-of-order core.

mod common;

use common::{assert_register_partition, commit_cycle, reg_value, run_core};
use riscsim_core::common::constants::EXCEPTION_VECTOR;

#[test]
fn arithmetic_chain_commits_and_computes() {
    let sim = run_core(&["addi x1, x0, 5", "addi x2, x0, 7", "add x3, x1, x2"]);

    assert_eq!(reg_value(&sim, 3), 12);
    assert!(!sim.processor.state.exception);
    assert_eq!(sim.processor.stats.instructions_retired, 3);
    assert!(sim.processor.state.active_list.is_empty());
    assert!(sim.processor.state.pc as usize >= 3);
}

#[test]
fn division_by_zero_rolls_back_precisely() {
    let sim = run_core(&[
        "addi x1, x0, 10",
        "addi x2, x0, 0",
        "divu x3, x1, x2",
        "addi x4, x0, 99",
    ]);
    let state = &sim.processor.state;

    // the fault was taken and recovery finished
    assert!(!state.exception);
    assert_eq!(state.exception_pc, 2);
    assert_eq!(state.pc, EXCEPTION_VECTOR);

    // the instructions older than the fault retired and kept their values
    assert_eq!(reg_value(&sim, 1), 10);
    assert_eq!(reg_value(&sim, 2), 0);

    // the faulting instruction and everything younger were undone
    assert_eq!(state.register_map[3], 3);
    assert_eq!(state.register_map[4], 4);
    assert_eq!(sim.processor.stats.instructions_retired, 2);
    assert_eq!(sim.processor.stats.exceptions_raised, 1);
}

#[test]
fn dependent_mulu_chain_commits_three_cycles_apart() {
    let sim = run_core(&[
        "mulu x1, x0, x0",
        "mulu x2, x1, x1",
        "mulu x3, x2, x2",
    ]);
    let snaps = sim.snapshots();

    let c0 = commit_cycle(snaps, 0).unwrap();
    let c1 = commit_cycle(snaps, 1).unwrap();
    let c2 = commit_cycle(snaps, 2).unwrap();
    assert_eq!(c1 - c0, 3);
    assert_eq!(c2 - c1, 3);
}

#[test]
fn register_partition_holds_every_cycle() {
    let sim = run_core(&[
        "addi x1, x0, 3",
        "addi x2, x0, 4",
        "mulu x3, x1, x2",
        "add x1, x3, x2",
        "sub x2, x1, x3",
        "remu x4, x1, x2",
        "add x1, x4, x4",
    ]);
    for snap in sim.snapshots() {
        assert_register_partition(snap);
    }
}

#[test]
fn ready_integer_queue_entries_have_cleared_tags() {
    let sim = run_core(&[
        "addi x1, x0, 1",
        "add x2, x1, x1",
        "mulu x3, x2, x1",
        "add x4, x3, x3",
    ]);
    for snap in sim.snapshots() {
        for entry in &snap.integer_queue {
            if entry.op_a_is_ready {
                assert_eq!(entry.op_a_reg_tag, 0);
            }
            if entry.op_b_is_ready {
                assert_eq!(entry.op_b_reg_tag, 0);
            }
        }
    }
}

#[test]
fn retirement_is_in_program_order() {
    let sim = run_core(&[
        "mulu x1, x0, x0",
        "addi x2, x0, 1",
        "addi x3, x0, 2",
        "add x4, x2, x3",
    ]);
    let snaps = sim.snapshots();
    // the quick addis behind the slow mulu may finish first but must not
    // retire first
    let cycles: Vec<usize> = (0..4).map(|pc| commit_cycle(snaps, pc).unwrap()).collect();
    for pair in cycles.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

#[test]
fn first_cycle_fetches_up_to_four() {
    let sim = run_core(&[
        "addi x1, x0, 1",
        "addi x2, x0, 2",
        "addi x3, x0, 3",
        "addi x4, x0, 4",
        "addi x5, x0, 5",
    ]);
    let snaps = sim.snapshots();
    assert_eq!(snaps[1].decoded_pcs, vec![0, 1, 2, 3]);
    assert_eq!(snaps[1].pc, 4);
}

#[test]
fn lone_division_by_zero_restores_initial_state() {
    let sim = run_core(&["divu x1, x0, x0"]);
    let state = &sim.processor.state;

    assert_eq!(state.pc, EXCEPTION_VECTOR);
    assert_eq!(state.exception_pc, 0);
    assert!(!state.exception);
    assert_eq!(
        state.register_map,
        (0..32).collect::<Vec<u32>>()
    );
    assert!(state.busy_bits.iter().all(|b| !b));
    assert!(state.active_list.is_empty());
    // the free list is a permutation of the original free registers
    let mut free: Vec<u32> = state.free_list.iter().copied().collect();
    free.sort_unstable();
    assert_eq!(free, (32..64).collect::<Vec<u32>>());
    assert_eq!(sim.processor.stats.instructions_retired, 0);
}

#[test]
fn snapshots_round_trip_through_json() {
    let sim = run_core(&["addi x1, x0, 1", "add x2, x1, x1"]);
    let json = sim.to_json();
    let back: Vec<riscsim_core::cpu::StateSnapshot> =
        serde_json::from_value(json).unwrap();
    assert_eq!(back.as_slice(), sim.snapshots());
}
