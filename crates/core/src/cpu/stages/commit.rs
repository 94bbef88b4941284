//! Commit stage: in-order retirement and precise-exception rollback.
//!
//! Normal mode retires up to `width` completed active-list heads in program
//! order, returning their old physical destinations to the free list. A head
//! marked with an exception switches the machine to rollback: the exception
//! latch is set, the exception PC is captured, and the PC jumps to the
//! exception vector. Rollback mode then undoes renames from the active-list
//! tail, up to `width` per cycle, until the list drains.
//!
//! After the retire walk (normal mode only) the forwarding bus is drained:
//! each broadcast marks its active-list entry done, clears the busy bit of
//! the result tag, and writes the physical register file unless the
//! instruction faulted.

use crate::common::constants::EXCEPTION_VECTOR;
use crate::cpu::state::ProcessorState;
use crate::stats::SimStats;

/// Executes the commit stage. Returns true when a rollback completed this
/// cycle (the active list drained and the exception latch was cleared).
pub fn commit_stage(
    state: &mut ProcessorState,
    width: usize,
    stats: &mut SimStats,
    trace: bool,
) -> bool {
    if state.exception {
        rollback(state, width, stats, trace)
    } else {
        retire(state, width, stats, trace);
        writeback(state, trace);
        false
    }
}

/// Normal-mode retirement walk.
fn retire(state: &mut ProcessorState, width: usize, stats: &mut SimStats, trace: bool) {
    for _ in 0..width {
        let head = match state.active_list.front() {
            Some(entry) => *entry,
            None => break,
        };

        if !head.done {
            break;
        }

        if head.exception {
            state.exception = true;
            state.exception_pc = head.pc;
            state.pc = EXCEPTION_VECTOR;
            stats.exceptions_raised += 1;
            if trace {
                eprintln!("CM  pc={} * EXCEPTION, entering rollback", head.pc);
            }
            // The faulting entry stays; rollback pops it with the rest.
            break;
        }

        state.free_list.push_back(head.old_dest);
        state.active_list.pop_front();
        stats.instructions_retired += 1;
        if trace {
            eprintln!("CM  pc={} RETIRE (p{} freed)", head.pc, head.old_dest);
        }
    }
}

/// Drains the forwarding bus into the active list and register file.
fn writeback(state: &mut ProcessorState, trace: bool) {
    for alu in &mut state.alus {
        alu.result_bus = None;
    }

    for result in &state.broadcast {
        if let Some(entry) = state
            .active_list
            .iter_mut()
            .find(|entry| entry.pc == result.pc)
        {
            entry.done = true;
            entry.exception = result.exception;
            state.busy_bits[result.dest_reg as usize] = false;
            if !result.exception {
                state.physical_registers[result.dest_reg as usize] = result.value;
            }
            if trace {
                eprintln!(
                    "CM  pc={} p{} <= {:#x} done{}",
                    result.pc,
                    result.dest_reg,
                    result.value,
                    if result.exception { " (exception)" } else { "" }
                );
            }
        }
    }
}

/// Rollback-mode walk: undo renames from the tail, newest first.
fn rollback(state: &mut ProcessorState, width: usize, stats: &mut SimStats, trace: bool) -> bool {
    stats.rollback_cycles += 1;

    for _ in 0..width {
        let entry = match state.active_list.pop_back() {
            Some(entry) => entry,
            None => break,
        };

        let current = state.register_map[entry.logical_dest as usize];
        state.free_list.push_back(current);
        state.register_map[entry.logical_dest as usize] = entry.old_dest;
        state.busy_bits[current as usize] = false;
        if trace {
            eprintln!(
                "CM  pc={} ROLLBACK x{}: p{} -> p{}",
                entry.pc, entry.logical_dest, current, entry.old_dest
            );
        }
    }

    if state.active_list.is_empty() {
        // Recovery complete: architectural state is as before the fault.
        state.exception = false;
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::state::{ActiveListEntry, AluResult};

    fn active(done: bool, exception: bool, logical: u32, old: u32, pc: u64) -> ActiveListEntry {
        ActiveListEntry {
            done,
            exception,
            logical_dest: logical,
            old_dest: old,
            pc,
        }
    }

    #[test]
    fn test_retire_in_order_up_to_width() {
        let mut state = ProcessorState::new(4);
        let mut stats = SimStats::default();
        for pc in 0..6 {
            state
                .active_list
                .push_back(active(true, false, pc as u32, pc as u32, pc));
        }
        commit_stage(&mut state, 4, &mut stats, false);
        assert_eq!(state.active_list.len(), 2);
        assert_eq!(stats.instructions_retired, 4);
        let freed: Vec<u32> = state.free_list.iter().rev().take(4).copied().collect();
        assert_eq!(freed, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_retire_stops_at_incomplete_head() {
        let mut state = ProcessorState::new(4);
        let mut stats = SimStats::default();
        state.active_list.push_back(active(false, false, 1, 1, 0));
        state.active_list.push_back(active(true, false, 2, 2, 1));
        commit_stage(&mut state, 4, &mut stats, false);
        // the done entry behind the incomplete head must not retire
        assert_eq!(state.active_list.len(), 2);
        assert_eq!(stats.instructions_retired, 0);
    }

    #[test]
    fn test_writeback_marks_done_and_writes_register() {
        let mut state = ProcessorState::new(4);
        let mut stats = SimStats::default();
        state.active_list.push_back(active(false, false, 1, 1, 0));
        state.busy_bits[32] = true;
        state.broadcast.push(AluResult {
            dest_reg: 32,
            value: 42,
            exception: false,
            pc: 0,
        });
        commit_stage(&mut state, 4, &mut stats, false);

        let entry = state.active_list.front().unwrap();
        assert!(entry.done);
        assert!(!entry.exception);
        assert!(!state.busy_bits[32]);
        assert_eq!(state.physical_registers[32], 42);
    }

    #[test]
    fn test_faulting_result_skips_register_write() {
        let mut state = ProcessorState::new(4);
        let mut stats = SimStats::default();
        state.active_list.push_back(active(false, false, 1, 1, 0));
        state.busy_bits[32] = true;
        state.physical_registers[32] = 7;
        state.broadcast.push(AluResult {
            dest_reg: 32,
            value: 99,
            exception: true,
            pc: 0,
        });
        commit_stage(&mut state, 4, &mut stats, false);

        let entry = state.active_list.front().unwrap();
        assert!(entry.done);
        assert!(entry.exception);
        assert_eq!(state.physical_registers[32], 7);
    }

    #[test]
    fn test_exception_head_enters_rollback() {
        let mut state = ProcessorState::new(4);
        let mut stats = SimStats::default();
        state.active_list.push_back(active(true, true, 3, 3, 2));
        commit_stage(&mut state, 4, &mut stats, false);

        assert!(state.exception);
        assert_eq!(state.exception_pc, 2);
        assert_eq!(state.pc, EXCEPTION_VECTOR);
        // entry remains for rollback
        assert_eq!(state.active_list.len(), 1);
    }

    #[test]
    fn test_rollback_restores_mapping() {
        let mut state = ProcessorState::new(4);
        let mut stats = SimStats::default();
        state.exception = true;
        // x3 was renamed 3 -> 34
        state.register_map[3] = 34;
        state.busy_bits[34] = true;
        state.active_list.push_back(active(true, true, 3, 3, 2));

        let drained = commit_stage(&mut state, 4, &mut stats, false);
        assert!(drained);
        assert!(!state.exception);
        assert_eq!(state.register_map[3], 3);
        assert!(!state.busy_bits[34]);
        assert_eq!(state.free_list.iter().last(), Some(&34));
    }

    #[test]
    fn test_rollback_is_lifo_and_width_limited() {
        let mut state = ProcessorState::new(4);
        let mut stats = SimStats::default();
        state.exception = true;
        // five renames of the same logical register: x1 -> 32 -> 33 ... -> 36
        for i in 0..5u32 {
            let old = if i == 0 { 1 } else { 31 + i };
            state.active_list.push_back(active(false, false, 1, old, i as u64));
        }
        state.register_map[1] = 36;

        let drained = commit_stage(&mut state, 4, &mut stats, false);
        assert!(!drained);
        assert_eq!(state.active_list.len(), 1);
        // four undone: 36 -> 35 -> 34 -> 33 -> 32
        assert_eq!(state.register_map[1], 32);

        let drained = commit_stage(&mut state, 4, &mut stats, false);
        assert!(drained);
        assert_eq!(state.register_map[1], 1);
        assert!(!state.exception);
    }
}
