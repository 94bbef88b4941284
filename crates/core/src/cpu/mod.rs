//! The out-of-order superscalar core.
//!
//! This module aggregates:
//! 1. **State:** Architectural and micro-architectural state plus snapshots.
//! 2. **Stages:** The six pipeline stage functions.
//! 3. **Processor:** The per-cycle driver running the stages in reverse
//!    pipeline order, with the commit state machine
//!    (Normal -> Rollback -> Done).

/// Processor state and cycle snapshots.
pub mod state;
/// Pipeline stage functions.
pub mod stages;

pub use state::{ProcessorState, StateSnapshot};

use crate::common::error::{DecodeError, SimError};
use crate::config::Config;
use crate::isa::{self, Instruction};
use crate::stats::SimStats;

/// The out-of-order core: program, state, and the cycle driver.
pub struct Processor {
    program: Vec<Instruction>,
    pub state: ProcessorState,
    pub stats: SimStats,
    width: usize,
    trace: bool,
    /// One-way flag set when a rollback completes; stepping stops for good.
    has_exception_occurred: bool,
}

impl Processor {
    /// Decodes the program and builds the initial processor state.
    ///
    /// The core implements the arithmetic subset only; any other opcode in
    /// the input is a decode error.
    pub fn new(lines: &[String], config: &Config) -> Result<Self, DecodeError> {
        let program = isa::parse_program(lines)?;
        for instr in &program {
            if !instr.op.is_arith() {
                return Err(DecodeError::new(
                    instr.id,
                    format!("opcode `{}` is not supported by the core", instr.op.mnemonic()),
                ));
            }
            let logical = crate::common::constants::LOGICAL_REGISTERS as u32;
            let operands = [instr.dest, instr.op_a, instr.op_b];
            if operands.iter().any(|&reg| reg >= logical) {
                return Err(DecodeError::new(
                    instr.id,
                    format!("register out of range for the core (x0..x{})", logical - 1),
                ));
            }
        }
        Ok(Self {
            program,
            state: ProcessorState::new(config.pipeline.num_alus),
            stats: SimStats::default(),
            width: config.pipeline.width,
            trace: config.sim.trace,
            has_exception_occurred: false,
        })
    }

    /// Runs one cycle.
    ///
    /// Stages execute in reverse pipeline order so every latch written this
    /// cycle is observed upstream only in the next cycle.
    pub fn step(&mut self) -> Result<(), SimError> {
        stages::forward_stage(&mut self.state);
        let rollback_drained =
            stages::commit_stage(&mut self.state, self.width, &mut self.stats, self.trace);
        if rollback_drained {
            self.has_exception_occurred = true;
        }
        stages::execute_stage(&mut self.state, self.trace);
        stages::issue_stage(&mut self.state, self.trace);
        stages::rename_stage(&mut self.state, &mut self.stats, self.trace)?;
        stages::fetch_stage(&mut self.state, &self.program, self.width, self.trace);
        self.stats.cycles += 1;
        Ok(())
    }

    /// Whether stepping has finished.
    ///
    /// One may step while any of {decode buffer non-empty, active list
    /// non-empty, PC inside the program, exception latch set} holds and no
    /// completed rollback has pinned the machine.
    pub fn is_done(&self) -> bool {
        if self.has_exception_occurred {
            return true;
        }
        self.state.decoded.is_empty()
            && self.state.active_list.is_empty()
            && self.state.pc as usize >= self.program.len()
            && !self.state.exception
    }

    /// Captures the externally visible state.
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Number of instructions in the decoded program.
    pub fn program_len(&self) -> usize {
        self.program.len()
    }
}
