//! Instruction renderer.
//!
//! Converts an [`Instruction`] back into its textual assembly form for the
//! bundle emitter, trace output and test diagnostics. Rendering is the exact
//! inverse of [`crate::isa::decode`] up to whitespace; a set predicate is
//! printed as a `(pN) ` prefix.

use crate::common::constants::{EC_ID, LC_ID};
use crate::isa::{Instruction, Opcode};

/// Renders an instruction as assembly text.
pub fn render(instr: &Instruction) -> String {
    let mut out = String::new();

    if let Some(pred) = instr.pred {
        out.push_str(&format!("(p{}) ", pred));
    }

    out.push_str(instr.op.mnemonic());

    match instr.op {
        Opcode::Nop => {}
        Opcode::Add | Opcode::Sub | Opcode::Mulu | Opcode::Divu | Opcode::Remu => {
            out.push_str(&format!(
                " x{}, x{}, x{}",
                instr.dest, instr.op_a, instr.op_b
            ));
        }
        Opcode::Addi => {
            out.push_str(&format!(" x{}, x{}, {}", instr.dest, instr.op_a, instr.imm));
        }
        Opcode::Ld | Opcode::St => {
            out.push_str(&format!(" x{}, {}(x{})", instr.dest, instr.imm, instr.op_a));
        }
        Opcode::Loop | Opcode::LoopPip => {
            out.push_str(&format!(" {}", instr.imm));
        }
        Opcode::MovReg => {
            out.push_str(&format!(" x{}, x{}", instr.dest, instr.op_a));
        }
        Opcode::MovImm => {
            if instr.dest == LC_ID {
                out.push_str(&format!(" LC, {}", instr.imm));
            } else if instr.dest == EC_ID {
                out.push_str(&format!(" EC, {}", instr.imm));
            } else {
                out.push_str(&format!(" x{}, {}", instr.dest, instr.imm));
            }
        }
        Opcode::MovPred => {
            let value = if instr.imm != 0 { "true" } else { "false" };
            out.push_str(&format!(" p{}, {}", instr.dest, value));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::parse_line;

    /// Decode then render must reproduce the source text.
    #[test]
    fn test_round_trip() {
        let lines = [
            "add x3, x1, x2",
            "addi x2, x0, -7",
            "sub x1, x1, x1",
            "mulu x4, x5, x6",
            "divu x4, x5, x6",
            "remu x4, x5, x6",
            "ld x7, 16(x2)",
            "st x7, 0(x2)",
            "loop 3",
            "loop.pip 1",
            "nop",
            "mov x3, x9",
            "mov x3, 42",
            "mov LC, 10",
            "mov EC, 2",
            "mov p32, true",
            "mov p35, false",
        ];
        for text in lines {
            let instr = parse_line(text, 0).unwrap();
            assert_eq!(render(&instr), text);
        }
    }

    #[test]
    fn test_predicate_prefix() {
        let mut instr = parse_line("addi x33, x32, 1", 0).unwrap();
        instr.pred = Some(32);
        assert_eq!(render(&instr), "(p32) addi x33, x32, 1");
    }
}
