//! Forward stage: snapshot ALU results onto the broadcast bus.
//!
//! The broadcast vector is consumed within the same cycle by issue (operand
//! wakeup), rename (operand capture) and commit (writeback); commit drains
//! the underlying per-ALU result buses.

use crate::cpu::state::ProcessorState;

/// Copies the front of every ALU result bus into the broadcast vector.
pub fn forward_stage(state: &mut ProcessorState) {
    state.broadcast.clear();
    for alu in &state.alus {
        if let Some(result) = alu.result_bus {
            state.broadcast.push(result);
        }
    }
}
