//! Non-pipelined loop compilation: ASAP list scheduling plus register
//! allocation.
//!
//! Scheduling emits into one growing bundle list, block by block. Within a
//! block an instruction's earliest time is the maximum of its producers'
//! times plus latencies, clamped to the bundle count at block entry. The
//! loop branch lands in the last bundle holding body work and its immediate
//! becomes the first body bundle.
//!
//! Register allocation runs in four phases:
//! 1. Fresh destination registers in execution order (x0 stays reserved).
//! 2. Operand linking along local / loop-invariant / post-loop edges, plus
//!    preheader interloop edges for body consumers.
//! 3. Interloop repair: a `mov` at the loop tail copies each body-produced
//!    register back over its preheader twin, shifting the branch down when
//!    the tail has no free ALU slot.
//! 4. Fresh registers for reads that no producer reaches; load/store address
//!    operands without a producer keep their original register (function
//!    argument live-ins).

use crate::compiler::blocks::{find_basic_blocks, Block};
use crate::compiler::bundle::{
    Schedule, VliwProgram, NUM_SLOTS, SLOT_ALU0, SLOT_ALU1, SLOT_BRANCH,
};
use crate::compiler::deps::{analyze_dependencies, DependencySet};
use crate::isa::{Instruction, Opcode};

/// Compiles the non-pipelined schedule.
pub fn compile(input: &[Instruction]) -> VliwProgram {
    let mut program: Vec<Instruction> = input.to_vec();
    let blocks = find_basic_blocks(&program);
    let deps = analyze_dependencies(&program, &blocks);

    let mut schedule = Schedule::new(program.len());
    let loop_bounds = schedule_blocks(&mut schedule, &mut program, &blocks, &deps);

    let alloc = allocate_registers(&mut program, &mut schedule, &blocks, &deps, loop_bounds);
    emit(&program, &schedule, &alloc)
}

/// Schedules all blocks; returns `(loop_start, branch bundle)` when a loop
/// exists.
fn schedule_blocks(
    schedule: &mut Schedule,
    program: &mut [Instruction],
    blocks: &[Block],
    deps: &[DependencySet],
) -> Option<(u64, u64)> {
    let bb0 = blocks[0];
    for i in bb0.start..bb0.end {
        let earliest = earliest_time(schedule, program, &deps[i].local, 0);
        schedule.place_asap(&program[i], earliest);
    }

    if blocks.len() < 2 {
        return None;
    }

    let bb1 = blocks[1];
    let body_end = bb1.end - 1; // the loop branch sits at bb1.end - 1

    // The body may not start before its preheader inputs are ready.
    let mut loop_start = schedule.len();
    for i in bb1.start..body_end {
        loop_start = earliest_time(schedule, program, &deps[i].loop_invariant, loop_start);
        let preheader: Vec<usize> = deps[i]
            .interloop
            .iter()
            .copied()
            .filter(|&p| p < bb1.start)
            .collect();
        loop_start = earliest_time(schedule, program, &preheader, loop_start);
    }

    for i in bb1.start..body_end {
        let earliest = earliest_time(schedule, program, &deps[i].local, loop_start);
        schedule.place_asap(&program[i], earliest);
    }

    // Branch placement: the last bundle with body work when its branch slot
    // is free, otherwise a dedicated bundle at the end.
    let loop_id = body_end;
    let latest_body = (bb1.start..body_end)
        .filter_map(|i| schedule.time_of(i))
        .max();
    let branch_time = match latest_body {
        Some(t) if schedule.bundles[t as usize][SLOT_BRANCH].is_none() => t,
        _ => {
            let t = schedule.len();
            schedule.grow_to(t + 1);
            t
        }
    };
    schedule.record(loop_id, branch_time, SLOT_BRANCH);
    program[loop_id].imm = loop_start as i64;

    let bb2 = blocks[2];
    let floor = schedule.len();
    for i in bb2.start..bb2.end {
        let mut earliest = earliest_time(schedule, program, &deps[i].local, floor);
        earliest = earliest_time(schedule, program, &deps[i].loop_invariant, earliest);
        earliest = earliest_time(schedule, program, &deps[i].post_loop, earliest);
        schedule.place_asap(&program[i], earliest);
    }

    Some((loop_start, branch_time))
}

/// Max of `floor` and each scheduled producer's time plus latency.
fn earliest_time(
    schedule: &Schedule,
    program: &[Instruction],
    producers: &[usize],
    floor: u64,
) -> u64 {
    producers
        .iter()
        .filter_map(|&p| schedule.time_of(p).map(|t| t + program[p].op.latency()))
        .fold(floor, u64::max)
}

/// Register assignments produced by the allocator; `None` keeps the
/// original register at emission.
struct Allocation {
    new_dest: Vec<Option<u32>>,
    op_a: Vec<Option<u32>>,
    op_b: Vec<Option<u32>>,
    next_reg: u32,
}

impl Allocation {
    fn new(len: usize) -> Self {
        Self {
            new_dest: vec![None; len],
            op_a: vec![None; len],
            op_b: vec![None; len],
            next_reg: 1,
        }
    }

    fn cover(&mut self, len: usize) {
        self.new_dest.resize(len, None);
        self.op_a.resize(len, None);
        self.op_b.resize(len, None);
    }

    fn fresh(&mut self) -> u32 {
        let reg = self.next_reg;
        self.next_reg += 1;
        reg
    }

    /// Links one producer register into the consumer's operands by
    /// position: first unresolved operand first; a binary op naming the
    /// same source register twice takes the link on both sides at once.
    fn link(&mut self, program: &[Instruction], consumer: usize, producer: usize) {
        let reg = match self.new_dest[producer] {
            Some(reg) => reg,
            None => return,
        };
        let instr = &program[consumer];
        match instr.op {
            Opcode::Add | Opcode::Sub | Opcode::Mulu | Opcode::Divu | Opcode::Remu => {
                let same_operands = instr.op_a == instr.op_b;
                if self.op_a[consumer].is_none() {
                    self.op_a[consumer] = Some(reg);
                    if same_operands && self.op_b[consumer].is_none() {
                        self.op_b[consumer] = Some(reg);
                    }
                } else if self.op_b[consumer].is_none() && !same_operands {
                    self.op_b[consumer] = Some(reg);
                }
            }
            Opcode::Addi | Opcode::Ld | Opcode::MovReg => {
                if self.op_a[consumer].is_none() {
                    self.op_a[consumer] = Some(reg);
                }
            }
            Opcode::St => {
                if self.new_dest[consumer].is_none() {
                    self.new_dest[consumer] = Some(reg);
                } else if self.op_a[consumer].is_none() {
                    self.op_a[consumer] = Some(reg);
                }
            }
            _ => {}
        }
    }
}

fn allocate_registers(
    program: &mut Vec<Instruction>,
    schedule: &mut Schedule,
    blocks: &[Block],
    deps: &[DependencySet],
    loop_bounds: Option<(u64, u64)>,
) -> Allocation {
    let original_len = program.len();
    let mut alloc = Allocation::new(original_len);

    // Phase 1: destinations in execution order.
    for bundle in &schedule.bundles {
        for slot in 0..NUM_SLOTS {
            if let Some(id) = bundle[slot] {
                let instr = &program[id];
                if instr.op.is_producer() && !instr.writes_special() {
                    let reg = alloc.fresh();
                    alloc.new_dest[id] = Some(reg);
                }
            }
        }
    }

    // Phase 2: operand linking in program order.
    let bb1 = blocks.get(1).copied();
    for i in 0..original_len {
        for &p in &deps[i].local {
            alloc.link(program, i, p);
        }
        for &p in &deps[i].loop_invariant {
            alloc.link(program, i, p);
        }
        for &p in &deps[i].post_loop {
            alloc.link(program, i, p);
        }
        if let Some(bb1) = bb1 {
            if bb1.contains(i) {
                // Body consumers read the preheader register; the tail mov
                // of phase 3 refreshes it every iteration.
                for &p in deps[i].interloop.iter().filter(|&&p| p < bb1.start) {
                    alloc.link(program, i, p);
                }
            }
        }
    }

    // Phase 3: interloop repair movs.
    if let (Some(bb1), Some((_, branch_time))) = (bb1, loop_bounds) {
        let pairs = interloop_mov_pairs(program, deps, bb1);
        insert_tail_movs(program, schedule, &mut alloc, &pairs, bb1, branch_time);
    }

    // Phase 4: reads no producer reaches.
    for bundle_index in 0..schedule.bundles.len() {
        for slot in 0..NUM_SLOTS {
            let id = match schedule.bundles[bundle_index][slot] {
                Some(id) => id,
                None => continue,
            };
            match program[id].op {
                Opcode::Add | Opcode::Sub | Opcode::Mulu | Opcode::Divu | Opcode::Remu => {
                    if alloc.op_a[id].is_none() {
                        let reg = alloc.fresh();
                        alloc.op_a[id] = Some(reg);
                    }
                    if alloc.op_b[id].is_none() {
                        let reg = alloc.fresh();
                        alloc.op_b[id] = Some(reg);
                    }
                }
                Opcode::Addi | Opcode::MovReg => {
                    if alloc.op_a[id].is_none() {
                        let reg = alloc.fresh();
                        alloc.op_a[id] = Some(reg);
                    }
                }
                Opcode::St => {
                    // The stored value gets a fresh register; the address
                    // without a producer is a live-in and keeps its name.
                    if alloc.new_dest[id].is_none() {
                        let reg = alloc.fresh();
                        alloc.new_dest[id] = Some(reg);
                    }
                }
                // A load address without a producer is a live-in too.
                _ => {}
            }
        }
    }

    alloc
}

/// Interloop pairs `(preheader producer, body producer)` of the same
/// register that feed a body consumer; each needs a tail `mov`.
fn interloop_mov_pairs(
    program: &[Instruction],
    deps: &[DependencySet],
    bb1: Block,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for c in bb1.start..bb1.end {
        for &p1 in &deps[c].interloop {
            if !bb1.contains(p1) || !program[p1].op.is_producer() {
                continue;
            }
            let reg = program[p1].dest;
            for &p0 in &deps[c].interloop {
                if p0 < bb1.start && program[p0].op.is_producer() && program[p0].dest == reg {
                    let pair = (p0, p1);
                    if !pairs.contains(&pair) {
                        pairs.push(pair);
                    }
                }
            }
        }
    }
    pairs
}

/// Synthesizes `mov` instructions at the loop tail, keeping the branch in
/// the last bundle of the body.
fn insert_tail_movs(
    program: &mut Vec<Instruction>,
    schedule: &mut Schedule,
    alloc: &mut Allocation,
    pairs: &[(usize, usize)],
    bb1: Block,
    branch_time: u64,
) {
    if pairs.is_empty() {
        return;
    }

    let loop_id = bb1.end - 1;
    let mut branch_t = branch_time as usize;

    // Moves a branch one bundle down by inserting an empty bundle after it.
    fn shift_branch(schedule: &mut Schedule, branch_t: &mut usize, loop_id: usize) {
        schedule.bundles[*branch_t][SLOT_BRANCH] = None;
        schedule.bundles.insert(*branch_t + 1, [None; NUM_SLOTS]);
        *branch_t += 1;
        schedule.bundles[*branch_t][SLOT_BRANCH] = Some(loop_id);
        schedule.cover_id(loop_id);
        schedule.time_table[loop_id] = Some(*branch_t as u64);
    }

    // Every mov must sit at or after its body producer's completion.
    let mut target = branch_t as u64;
    for &(_, p1) in pairs {
        if let Some(t) = schedule.time_of(p1) {
            target = target.max(t + program[p1].op.latency());
        }
    }
    while (branch_t as u64) < target {
        shift_branch(schedule, &mut branch_t, loop_id);
    }

    for &(p0, p1) in pairs {
        let (dest, src) = match (alloc.new_dest[p0], alloc.new_dest[p1]) {
            (Some(dest), Some(src)) => (dest, src),
            _ => continue,
        };

        let id = program.len();
        let mut mov = Instruction::nop(id);
        mov.op = Opcode::MovReg;
        mov.dest = dest;
        mov.op_a = src;
        program.push(mov);

        alloc.cover(program.len());
        alloc.new_dest[id] = Some(dest);
        alloc.op_a[id] = Some(src);

        loop {
            let bundle = &mut schedule.bundles[branch_t];
            let slot = [SLOT_ALU0, SLOT_ALU1]
                .into_iter()
                .find(|&s| bundle[s].is_none());
            match slot {
                Some(slot) => {
                    schedule.record(id, branch_t as u64, slot);
                    break;
                }
                None => shift_branch(schedule, &mut branch_t, loop_id),
            }
        }
    }
}

/// Applies the allocation and renders the bundles.
fn emit(program: &[Instruction], schedule: &Schedule, alloc: &Allocation) -> VliwProgram {
    let mut rows = Vec::with_capacity(schedule.bundles.len());
    for bundle in &schedule.bundles {
        let mut row = [Instruction::nop(0); NUM_SLOTS];
        for slot in 0..NUM_SLOTS {
            if let Some(id) = bundle[slot] {
                let mut instr = program[id];
                if !instr.writes_special() {
                    if let Some(dest) = alloc.new_dest[id] {
                        instr.dest = dest;
                    }
                }
                if let Some(op_a) = alloc.op_a[id] {
                    instr.op_a = op_a;
                }
                if let Some(op_b) = alloc.op_b[id] {
                    instr.op_b = op_b;
                }
                row[slot] = instr;
            }
        }
        rows.push(row);
    }
    VliwProgram::from_bundles(&rows)
}
