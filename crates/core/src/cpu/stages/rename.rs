//! Rename/dispatch stage.
//!
//! Renames all decoded instructions atomically (all-or-nothing): each gets a
//! fresh physical destination from the free list, an active-list entry, and
//! an integer-queue entry with operand readiness resolved against the
//! register file and the forwarding bus. Insufficient active-list or
//! integer-queue capacity stalls the whole group with no side effects.
//! Source operand tags are read before the destination map is updated, so an
//! instruction reading its own destination sees the previous producer.

use crate::common::constants::{ACTIVE_LIST_CAPACITY, INTEGER_QUEUE_CAPACITY};
use crate::common::error::SimError;
use crate::cpu::state::{ActiveListEntry, IntegerQueueEntry, Operand, ProcessorState};
use crate::isa::Opcode;
use crate::stats::SimStats;

/// Executes the rename stage.
pub fn rename_stage(
    state: &mut ProcessorState,
    stats: &mut SimStats,
    trace: bool,
) -> Result<(), SimError> {
    if state.exception {
        // Flush wave: drop everything dispatched but not yet issued.
        state.integer_queue.clear();
        return Ok(());
    }

    if state.decoded.is_empty() {
        return Ok(());
    }

    let count = state.decoded.len();
    if state.active_list.len() + count > ACTIVE_LIST_CAPACITY
        || state.integer_queue.len() + count > INTEGER_QUEUE_CAPACITY
    {
        stats.rename_stalls += 1;
        return Ok(());
    }

    for _ in 0..count {
        let decoded = match state.decoded.pop_front() {
            Some(d) => d,
            None => break,
        };
        let instr = decoded.instr;

        let op_a = read_operand(state, instr.op_a);
        let op_b = if instr.op == Opcode::Addi {
            Operand::ready(instr.imm as u64)
        } else {
            read_operand(state, instr.op_b)
        };

        let new_dest = state
            .free_list
            .pop_front()
            .ok_or(SimError::FreeListExhausted { pc: decoded.pc })?;
        state.busy_bits[new_dest as usize] = true;

        let old_dest = state.register_map[instr.dest as usize];
        state.register_map[instr.dest as usize] = new_dest;

        state.active_list.push_back(ActiveListEntry {
            done: false,
            exception: false,
            logical_dest: instr.dest,
            old_dest,
            pc: decoded.pc,
        });

        state.integer_queue.push(IntegerQueueEntry {
            dest_reg: new_dest,
            op_a,
            op_b,
            op: instr.op,
            pc: decoded.pc,
        });

        if trace {
            eprintln!(
                "RN  pc={} x{} -> p{} (old p{})",
                decoded.pc, instr.dest, new_dest, old_dest
            );
        }
    }

    Ok(())
}

/// Resolves one source operand at rename time.
///
/// Not busy: capture the physical-register value. Busy but broadcasting this
/// cycle: capture the forwarded value. Otherwise: wait on the tag.
fn read_operand(state: &ProcessorState, reg: u32) -> Operand {
    let tag = state.register_map[reg as usize];
    if !state.busy_bits[tag as usize] {
        Operand::ready(state.physical_registers[tag as usize])
    } else if let Some(result) = state.lookup_forward(tag) {
        Operand::ready(result.value)
    } else {
        Operand::pending(tag)
    }
}
