//! Assembly text parser.
//!
//! Converts textual assembly lines into structured [`Instruction`]s. The
//! accepted grammar:
//!
//! ```text
//! add rD, rA, rB        sub / mulu / divu / remu likewise
//! addi rD, rA, imm
//! ld rD, imm(rA)        st rD, imm(rA)
//! loop target           loop.pip target
//! mov rD, rA            mov rD, imm
//! mov LC, imm           mov EC, imm
//! mov pD, true|false
//! nop
//! ```
//!
//! Registers are `xN`, predicate registers `pN`. Malformed lines yield a
//! [`DecodeError`] naming the line; parsing is all-or-nothing.

use crate::common::constants::{EC_ID, LC_ID, VLIW_REGISTERS};
use crate::common::error::DecodeError;
use crate::isa::{Instruction, Opcode};

/// Parses a whole program. The instruction `id` is the line index.
pub fn parse_program(lines: &[String]) -> Result<Vec<Instruction>, DecodeError> {
    lines
        .iter()
        .enumerate()
        .map(|(id, line)| parse_line(line, id))
        .collect()
}

/// Parses a single assembly line into an [`Instruction`].
pub fn parse_line(line: &str, id: usize) -> Result<Instruction, DecodeError> {
    let cleaned = line.replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mnemonic = tokens
        .first()
        .copied()
        .ok_or_else(|| DecodeError::new(id, "empty instruction"))?;

    let mut instr = Instruction::nop(id);

    match mnemonic {
        "add" | "sub" | "mulu" | "divu" | "remu" => {
            instr.op = match mnemonic {
                "add" => Opcode::Add,
                "sub" => Opcode::Sub,
                "mulu" => Opcode::Mulu,
                "divu" => Opcode::Divu,
                _ => Opcode::Remu,
            };
            expect_operands(&tokens, 3, id)?;
            instr.dest = parse_reg(tokens[1], 'x', id)?;
            instr.op_a = parse_reg(tokens[2], 'x', id)?;
            instr.op_b = parse_reg(tokens[3], 'x', id)?;
        }
        "addi" => {
            instr.op = Opcode::Addi;
            expect_operands(&tokens, 3, id)?;
            instr.dest = parse_reg(tokens[1], 'x', id)?;
            instr.op_a = parse_reg(tokens[2], 'x', id)?;
            instr.imm = parse_imm(tokens[3], id)?;
        }
        "ld" | "st" => {
            instr.op = if mnemonic == "ld" { Opcode::Ld } else { Opcode::St };
            expect_operands(&tokens, 2, id)?;
            instr.dest = parse_reg(tokens[1], 'x', id)?;
            let (imm, base) = parse_address(tokens[2], id)?;
            instr.imm = imm;
            instr.op_a = base;
        }
        "loop" | "loop.pip" => {
            instr.op = if mnemonic == "loop" {
                Opcode::Loop
            } else {
                Opcode::LoopPip
            };
            expect_operands(&tokens, 1, id)?;
            instr.imm = parse_imm(tokens[1], id)?;
        }
        "mov" => {
            expect_operands(&tokens, 2, id)?;
            parse_mov(&mut instr, tokens[1], tokens[2], id)?;
        }
        "nop" => {
            instr.op = Opcode::Nop;
        }
        other => {
            return Err(DecodeError::new(id, format!("unknown opcode `{}`", other)));
        }
    }

    Ok(instr)
}

/// Disambiguates the three `mov` forms by operand shape.
fn parse_mov(instr: &mut Instruction, op1: &str, op2: &str, id: usize) -> Result<(), DecodeError> {
    if op1.starts_with('p') {
        instr.op = Opcode::MovPred;
        instr.dest = parse_reg(op1, 'p', id)?;
        instr.imm = match op2 {
            "true" => 1,
            "false" => 0,
            other => {
                return Err(DecodeError::new(
                    id,
                    format!("predicate value must be true or false, got `{}`", other),
                ));
            }
        };
    } else if op1 == "LC" || op1 == "EC" {
        instr.op = Opcode::MovImm;
        instr.dest = if op1 == "LC" { LC_ID } else { EC_ID };
        instr.imm = parse_imm(op2, id)?;
    } else if op2.starts_with('x') {
        instr.op = Opcode::MovReg;
        instr.dest = parse_reg(op1, 'x', id)?;
        instr.op_a = parse_reg(op2, 'x', id)?;
    } else {
        instr.op = Opcode::MovImm;
        instr.dest = parse_reg(op1, 'x', id)?;
        instr.imm = parse_imm(op2, id)?;
    }
    Ok(())
}

fn expect_operands(tokens: &[&str], count: usize, id: usize) -> Result<(), DecodeError> {
    if tokens.len() != count + 1 {
        return Err(DecodeError::new(
            id,
            format!("expected {} operands, got {}", count, tokens.len() - 1),
        ));
    }
    Ok(())
}

fn parse_reg(token: &str, prefix: char, id: usize) -> Result<u32, DecodeError> {
    let rest = token
        .strip_prefix(prefix)
        .ok_or_else(|| DecodeError::new(id, format!("expected `{}N`, got `{}`", prefix, token)))?;
    let index = rest
        .parse::<u32>()
        .map_err(|_| DecodeError::new(id, format!("bad register `{}`", token)))?;
    if index >= VLIW_REGISTERS {
        return Err(DecodeError::new(
            id,
            format!("register `{}` out of range", token),
        ));
    }
    Ok(index)
}

fn parse_imm(token: &str, id: usize) -> Result<i64, DecodeError> {
    let (digits, radix) = match token.strip_prefix("0x") {
        Some(hex) => (hex, 16),
        None => (token, 10),
    };
    i64::from_str_radix(digits, radix)
        .map_err(|_| DecodeError::new(id, format!("bad immediate `{}`", token)))
}

/// Parses the `imm(xN)` memory-address form.
fn parse_address(token: &str, id: usize) -> Result<(i64, u32), DecodeError> {
    let open = token
        .find('(')
        .ok_or_else(|| DecodeError::new(id, format!("bad address `{}`", token)))?;
    let close = token
        .find(')')
        .filter(|&c| c > open)
        .ok_or_else(|| DecodeError::new(id, format!("bad address `{}`", token)))?;
    let imm = if open == 0 {
        0
    } else {
        parse_imm(&token[..open], id)?
    };
    let base = parse_reg(&token[open + 1..close], 'x', id)?;
    Ok((imm, base))
}
