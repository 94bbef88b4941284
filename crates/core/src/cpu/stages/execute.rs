//! Execute stage: the parallel two-cycle ALUs.
//!
//! Per ALU and cycle: a latched result moves to the result bus (picked up by
//! forward/commit next cycle), then a waiting issue-slot entry is computed
//! into the latch. Division and remainder by zero flag an exception in the
//! result instead of aborting the ALU.

use crate::cpu::state::{AluInput, AluResult, ProcessorState};
use crate::isa::Opcode;

/// Executes one cycle of every ALU.
pub fn execute_stage(state: &mut ProcessorState, trace: bool) {
    if state.exception {
        // Squash in-flight work; only rollback commits run from here on.
        for alu in &mut state.alus {
            alu.flush();
        }
        return;
    }

    for (alu_id, alu) in state.alus.iter_mut().enumerate() {
        if let Some(result) = alu.latch.take() {
            alu.result_bus = Some(result);
        }
        if let Some(input) = alu.issue_slot.take() {
            let result = compute(&input);
            if trace {
                eprintln!(
                    "EX  pc={} alu{} p{} <= {:#x}{}",
                    input.pc,
                    alu_id,
                    result.dest_reg,
                    result.value,
                    if result.exception { " (exception)" } else { "" }
                );
            }
            alu.latch = Some(result);
        }
    }
}

/// Computes one arithmetic result; 64-bit wrapping semantics.
fn compute(input: &AluInput) -> AluResult {
    let (value, exception) = match input.op {
        Opcode::Add | Opcode::Addi => (input.op_a.wrapping_add(input.op_b), false),
        Opcode::Sub => (input.op_a.wrapping_sub(input.op_b), false),
        Opcode::Mulu => (input.op_a.wrapping_mul(input.op_b), false),
        Opcode::Divu => {
            if input.op_b == 0 {
                (0, true)
            } else {
                (input.op_a / input.op_b, false)
            }
        }
        Opcode::Remu => {
            if input.op_b == 0 {
                (0, true)
            } else {
                (input.op_a % input.op_b, false)
            }
        }
        // Non-arithmetic opcodes are rejected at program load.
        other => unreachable!("opcode `{}` reached execute", other.mnemonic()),
    };

    AluResult {
        dest_reg: input.dest_reg,
        value,
        exception,
        pc: input.pc,
    }
}
