//! Instruction set definition shared by the core and the compiler.
//!
//! This module defines:
//! 1. **Opcodes:** The full ISA used by the compiler; the out-of-order core
//!    restricts itself to the arithmetic subset.
//! 2. **Instructions:** The structured form produced by the parser.
//! 3. **Classification:** Functional-unit mapping, latency, and the producer
//!    predicate used by the dependency analyzer.

/// Text parser: assembly lines to [`Instruction`]s.
pub mod decode;
/// Text renderer: [`Instruction`]s back to assembly lines.
pub mod disasm;

pub use decode::{parse_line, parse_program};
pub use disasm::render;

use crate::common::constants::{EC_ID, LC_ID};

/// Operation codes of the ISA.
///
/// The three `mov` forms share the `mov` mnemonic and are distinguished
/// syntactically by their operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Addi,
    Sub,
    Mulu,
    Divu,
    Remu,
    Ld,
    St,
    Loop,
    LoopPip,
    Nop,
    /// `mov rD, rA`
    MovReg,
    /// `mov rD, imm` / `mov LC|EC, imm`
    MovImm,
    /// `mov pD, true|false`
    MovPred,
}

/// Functional-unit classes of a VLIW bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuncUnit {
    Alu,
    Mul,
    Mem,
    Branch,
}

impl Opcode {
    /// Lowercase textual mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Addi => "addi",
            Opcode::Sub => "sub",
            Opcode::Mulu => "mulu",
            Opcode::Divu => "divu",
            Opcode::Remu => "remu",
            Opcode::Ld => "ld",
            Opcode::St => "st",
            Opcode::Loop => "loop",
            Opcode::LoopPip => "loop.pip",
            Opcode::Nop => "nop",
            Opcode::MovReg | Opcode::MovImm | Opcode::MovPred => "mov",
        }
    }

    /// The functional unit this opcode occupies in a bundle.
    pub fn func_unit(self) -> FuncUnit {
        match self {
            Opcode::Add
            | Opcode::Addi
            | Opcode::Sub
            | Opcode::Divu
            | Opcode::Remu
            | Opcode::MovReg
            | Opcode::MovImm
            | Opcode::MovPred
            | Opcode::Nop => FuncUnit::Alu,
            Opcode::Mulu => FuncUnit::Mul,
            Opcode::Ld | Opcode::St => FuncUnit::Mem,
            Opcode::Loop | Opcode::LoopPip => FuncUnit::Branch,
        }
    }

    /// Result latency in cycles as seen by the scheduler.
    pub fn latency(self) -> u64 {
        match self {
            Opcode::Mulu => 3,
            _ => 1,
        }
    }

    /// Whether the opcode writes a general register.
    ///
    /// `st`, branches, `nop` and predicate moves produce no register value.
    pub fn is_producer(self) -> bool {
        !matches!(
            self,
            Opcode::St | Opcode::Loop | Opcode::LoopPip | Opcode::Nop | Opcode::MovPred
        )
    }

    /// Whether the out-of-order core implements this opcode.
    pub fn is_arith(self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::Addi | Opcode::Sub | Opcode::Mulu | Opcode::Divu | Opcode::Remu
        )
    }
}

/// One decoded instruction.
///
/// `dest` doubles as the data source for `st` and as the predicate index for
/// `mov pD, ...`. `imm` doubles as the loop target for branches. `id` is the
/// position of the instruction in the original program and stays stable
/// across scheduling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub dest: u32,
    pub op_a: u32,
    pub op_b: u32,
    pub imm: i64,
    pub id: usize,
    /// Predicate register guarding execution, set by the pipelined emitter.
    pub pred: Option<u32>,
}

impl Instruction {
    /// A `nop` with the given program id.
    pub fn nop(id: usize) -> Self {
        Self {
            op: Opcode::Nop,
            dest: 0,
            op_a: 0,
            op_b: 0,
            imm: 0,
            id,
            pred: None,
        }
    }

    /// General registers read by this instruction, in operand order.
    ///
    /// `st` reads its data register (`dest`) and its address register
    /// (`op_a`). LC/EC destinations are not general registers and never
    /// appear here.
    pub fn reads(&self) -> Vec<u32> {
        match self.op {
            Opcode::Add | Opcode::Sub | Opcode::Mulu | Opcode::Divu | Opcode::Remu => {
                vec![self.op_a, self.op_b]
            }
            Opcode::Addi | Opcode::Ld | Opcode::MovReg => vec![self.op_a],
            Opcode::St => vec![self.dest, self.op_a],
            _ => Vec::new(),
        }
    }

    /// Whether the destination is one of the special loop counters.
    pub fn writes_special(&self) -> bool {
        matches!(self.op, Opcode::MovImm) && (self.dest == LC_ID || self.dest == EC_ID)
    }
}
