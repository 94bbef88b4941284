//! Dependency analysis over basic blocks.
//!
//! For every instruction the analyzer produces four disjoint, sorted lists
//! of producer indices:
//! - **local**: producer and consumer in the same block, producer first.
//! - **interloop**: the value arrives from a later position of the previous
//!   iteration (or from the preheader for the first iteration; such pairs
//!   carry both producer indices).
//! - **loop_invariant**: produced in the preheader, consumed in the loop
//!   body or postlude, and never masked by a body producer of the same
//!   register.
//! - **post_loop**: produced in the loop body, consumed in the postlude.
//!
//! Also computed here: the resource-limited minimum initiation interval for
//! modulo scheduling.

use crate::common::constants::{
    NUM_ALU_UNITS, NUM_BRANCH_UNITS, NUM_MEM_UNITS, NUM_MUL_UNITS, REGISTERS_WITH_SPECIAL,
};
use crate::compiler::blocks::Block;
use crate::isa::{FuncUnit, Instruction};

/// Producer edges of one instruction, one list per dependency class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencySet {
    pub local: Vec<usize>,
    pub interloop: Vec<usize>,
    pub loop_invariant: Vec<usize>,
    pub post_loop: Vec<usize>,
}

/// Per-register table of the most recent producer index.
type ProducerTable = [Option<usize>; REGISTERS_WITH_SPECIAL];

fn record_producer(producers: &mut ProducerTable, program: &[Instruction], index: usize) {
    let instr = &program[index];
    if instr.op.is_producer() {
        producers[instr.dest as usize] = Some(index);
    }
}

/// Producers feeding the reads of `instr`, as `(producer index, register)`.
fn read_dependencies(producers: &ProducerTable, instr: &Instruction) -> Vec<(usize, u32)> {
    instr
        .reads()
        .into_iter()
        .filter_map(|reg| producers[reg as usize].map(|p| (p, reg)))
        .collect()
}

/// Computes the dependency sets for every instruction.
pub fn analyze_dependencies(program: &[Instruction], blocks: &[Block]) -> Vec<DependencySet> {
    let mut result = vec![DependencySet::default(); program.len()];

    // Local edges: forward sweep per block.
    for block in blocks {
        let mut producers: ProducerTable = [None; REGISTERS_WITH_SPECIAL];
        for i in block.start..block.end {
            if i > block.start {
                record_producer(&mut producers, program, i - 1);
            }
            for (p, _) in read_dependencies(&producers, &program[i]) {
                result[i].local.push(p);
            }
        }
    }

    if blocks.len() > 1 {
        let (bb0, bb1, bb2) = (blocks[0], blocks[1], blocks[2]);

        let mut bb0_producers: ProducerTable = [None; REGISTERS_WITH_SPECIAL];
        for i in bb0.start..bb0.end {
            record_producer(&mut bb0_producers, program, i);
        }
        let mut bb1_producers: ProducerTable = [None; REGISTERS_WITH_SPECIAL];
        for i in bb1.start..bb1.end {
            record_producer(&mut bb1_producers, program, i);
        }

        // Interloop edges: backward sweep so producers at or after the
        // consumer are visible; a matching preheader producer is paired in.
        let mut producers: ProducerTable = [None; REGISTERS_WITH_SPECIAL];
        for i in (bb1.start..bb1.end).rev() {
            record_producer(&mut producers, program, i);
            for (p, reg) in read_dependencies(&producers, &program[i]) {
                result[i].interloop.push(p);
                if let Some(p0) = bb0_producers[reg as usize] {
                    result[i].interloop.push(p0);
                }
            }
        }

        // Loop-invariant edges: preheader producers reaching body or
        // postlude consumers, unless a body producer masks the register or a
        // local edge already covers it.
        for block in [bb1, bb2] {
            for i in block.start..block.end {
                for (p, reg) in read_dependencies(&bb0_producers, &program[i]) {
                    if bb1_producers[reg as usize].is_some() {
                        continue;
                    }
                    if result[i]
                        .local
                        .iter()
                        .any(|&q| program[q].dest == reg && program[q].op.is_producer())
                    {
                        continue;
                    }
                    result[i].loop_invariant.push(p);
                }
            }
        }

        // Post-loop edges: body producers reaching postlude consumers.
        for i in bb2.start..bb2.end {
            for (p, _) in read_dependencies(&bb1_producers, &program[i]) {
                result[i].post_loop.push(p);
            }
        }
    }

    for deps in &mut result {
        for list in [
            &mut deps.local,
            &mut deps.interloop,
            &mut deps.loop_invariant,
            &mut deps.post_loop,
        ] {
            list.sort_unstable();
            list.dedup();
        }
    }

    result
}

fn ceil_div(count: u32, units: u32) -> u64 {
    if count == 0 {
        0
    } else {
        (1 + (count - 1) / units) as u64
    }
}

/// Resource-limited minimum initiation interval over the loop body.
///
/// Returns 0 when the program has no loop.
pub fn min_initiation_interval(program: &[Instruction], blocks: &[Block]) -> u64 {
    if blocks.len() < 2 {
        return 0;
    }

    let body = blocks[1];
    let (mut alu, mut mul, mut mem, mut branch) = (0u32, 0u32, 0u32, 0u32);
    for instr in &program[body.start..body.end] {
        match instr.op.func_unit() {
            FuncUnit::Alu => alu += 1,
            FuncUnit::Mul => mul += 1,
            FuncUnit::Mem => mem += 1,
            FuncUnit::Branch => branch += 1,
        }
    }

    ceil_div(alu, NUM_ALU_UNITS)
        .max(ceil_div(mul, NUM_MUL_UNITS))
        .max(ceil_div(mem, NUM_MEM_UNITS))
        .max(ceil_div(branch, NUM_BRANCH_UNITS))
}
