//! Error definitions for decoding and simulation.
//!
//! Parse errors are user errors: they are reported and abort the run.
//! Simulation errors are programmer errors (invariant violations) surfaced
//! with a diagnostic rather than silently corrupting state.

use std::fmt;

/// Error produced when a textual assembly line cannot be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError {
    /// Zero-based index of the offending line in the input program.
    pub line: usize,
    /// Human-readable reason.
    pub reason: String,
}

impl DecodeError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

impl std::error::Error for DecodeError {}

/// Invariant violations inside the simulator.
///
/// These indicate bugs in the pipeline model, not malformed input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// The free list was empty although the active list had capacity slack.
    FreeListExhausted { pc: u64 },
    /// An opcode reached the execute stage that no ALU implements.
    UnknownOpcode { pc: u64, mnemonic: &'static str },
    /// The configured cycle cap was reached before the program finished.
    CycleLimit { cycles: u64 },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::FreeListExhausted { pc } => {
                write!(f, "free list exhausted at pc {}", pc)
            }
            SimError::UnknownOpcode { pc, mnemonic } => {
                write!(f, "unknown opcode `{}` at execute, pc {}", mnemonic, pc)
            }
            SimError::CycleLimit { cycles } => {
                write!(f, "cycle limit reached after {} cycles", cycles)
            }
        }
    }
}

impl std::error::Error for SimError {}
