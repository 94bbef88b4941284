//! Fetch/decode stage.
//!
//! Refills the decode buffer once the rename stage has drained it: up to
//! `width` instructions starting at PC, stopping at program end. A non-empty
//! decode buffer backpressures fetch into a no-op. While the exception latch
//! is set the buffer is cleared and fetch is suppressed.

use crate::cpu::state::{DecodedInstruction, ProcessorState};
use crate::isa::Instruction;

/// Executes the fetch/decode stage.
pub fn fetch_stage(state: &mut ProcessorState, program: &[Instruction], width: usize, trace: bool) {
    if state.exception {
        state.decoded.clear();
        return;
    }

    if !state.decoded.is_empty() {
        return;
    }

    for _ in 0..width {
        let pc = state.pc;
        if pc as usize >= program.len() {
            break;
        }
        state.decoded.push_back(DecodedInstruction {
            pc,
            instr: program[pc as usize],
        });
        state.pc += 1;
        if trace {
            eprintln!("IF  pc={} fetched", pc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::parse_line;

    fn program(n: usize) -> Vec<Instruction> {
        (0..n)
            .map(|id| parse_line("addi x1, x0, 1", id).unwrap())
            .collect()
    }

    #[test]
    fn test_fetch_width_limited() {
        let mut state = ProcessorState::new(4);
        let prog = program(10);
        fetch_stage(&mut state, &prog, 4, false);
        assert_eq!(state.decoded.len(), 4);
        assert_eq!(state.pc, 4);
    }

    #[test]
    fn test_fetch_stops_at_program_end() {
        let mut state = ProcessorState::new(4);
        let prog = program(3);
        fetch_stage(&mut state, &prog, 4, false);
        assert_eq!(state.decoded.len(), 3);
        assert_eq!(state.pc, 3);
    }

    #[test]
    fn test_backpressure() {
        let mut state = ProcessorState::new(4);
        let prog = program(8);
        fetch_stage(&mut state, &prog, 4, false);
        fetch_stage(&mut state, &prog, 4, false);
        // second call is a no-op: the buffer was not drained
        assert_eq!(state.decoded.len(), 4);
        assert_eq!(state.pc, 4);
    }

    #[test]
    fn test_exception_clears_buffer() {
        let mut state = ProcessorState::new(4);
        let prog = program(8);
        fetch_stage(&mut state, &prog, 4, false);
        state.exception = true;
        fetch_stage(&mut state, &prog, 4, false);
        assert!(state.decoded.is_empty());
        assert_eq!(state.pc, 4);
    }
}
