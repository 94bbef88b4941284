//! Issue stage.
//!
//! Wakes pending operands against the forwarding bus, then scans the integer
//! queue in insertion order and moves each ready entry to a free ALU (lowest
//! index wins). Skipped entirely while the exception latch is set.

use crate::cpu::state::{AluInput, ProcessorState};

/// Executes the issue stage.
pub fn issue_stage(state: &mut ProcessorState, trace: bool) {
    if state.exception || state.integer_queue.is_empty() {
        return;
    }

    wakeup(state);

    let mut index = 0;
    while index < state.integer_queue.len() {
        let entry = state.integer_queue[index];
        if entry.op_a.ready && entry.op_b.ready {
            if let Some((alu_id, alu)) = state
                .alus
                .iter_mut()
                .enumerate()
                .find(|(_, alu)| alu.issue_slot.is_none())
            {
                alu.issue_slot = Some(AluInput {
                    dest_reg: entry.dest_reg,
                    op_a: entry.op_a.value,
                    op_b: entry.op_b.value,
                    op: entry.op,
                    pc: entry.pc,
                });
                state.integer_queue.remove(index);
                if trace {
                    eprintln!("IS  pc={} -> alu{}", entry.pc, alu_id);
                }
                continue;
            }
            // every ALU is occupied; nothing more can issue this cycle
            break;
        }
        index += 1;
    }
}

/// Marks pending operands ready when the forwarding bus carries their tag.
fn wakeup(state: &mut ProcessorState) {
    let broadcast = state.broadcast.clone();
    for entry in &mut state.integer_queue {
        for operand in [&mut entry.op_a, &mut entry.op_b] {
            if !operand.ready {
                if let Some(result) = broadcast.iter().find(|r| r.dest_reg == operand.tag) {
                    operand.ready = true;
                    operand.tag = 0;
                    operand.value = result.value;
                }
            }
        }
    }
}
