//! Software pipelining: modulo scheduling with rotating registers.
//!
//! The loop body is placed with modulo ASAP against a `II x 5` reservation
//! table; when placement or the interloop check fails the initiation
//! interval is bumped and the body is rescheduled from a clean snapshot.
//! This terminates because at II equal to the body length the sequential
//! schedule fits.
//!
//! After a feasible schedule:
//! 1. **Stages:** The body splits into groups of II bundles; `stage(t) =
//!    (t - loop_start) / II`.
//! 2. **Rotating rename:** Body producers get rotating registers spaced
//!    `stages + 1` apart in bundle order; consumers offset the producer's
//!    register by their stage distance (plus one across iterations).
//! 3. **Predication:** Stage k executes under `p(32 + k)`.
//! 4. **Compression:** Later stages fold slot-wise into the first II
//!    bundles.
//! 5. **Prologue:** `mov p32, true` and `mov EC, stages - 1` land in the
//!    bundle before the kernel, or in a fresh bundle with the branch target
//!    bumped.

use crate::common::constants::{EC_ID, ROTATING_BASE};
use crate::compiler::blocks::{find_basic_blocks, Block};
use crate::compiler::bundle::{
    slots_for, ReservationTable, Schedule, VliwProgram, NUM_SLOTS, SLOT_ALU0, SLOT_ALU1,
    SLOT_BRANCH,
};
use crate::compiler::deps::{analyze_dependencies, min_initiation_interval, DependencySet};
use crate::isa::{Instruction, Opcode};

/// Compiles the software-pipelined schedule.
pub fn compile(input: &[Instruction]) -> VliwProgram {
    Pipeliner::new(input).run()
}

/// Per-operand rename bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
struct RenameFlags {
    op_a: bool,
    op_b: bool,
    dest: bool,
}

struct Pipeliner {
    program: Vec<Instruction>,
    blocks: Vec<Block>,
    deps: Vec<DependencySet>,
    schedule: Schedule,
    ii: u64,
    loop_start: u64,
    loop_end: u64,
    stages: u64,
    /// Renamed destination per instruction id (producers only).
    new_dest: Vec<Option<u32>>,
    flags: Vec<RenameFlags>,
    next_non_rotating: u32,
}

impl Pipeliner {
    fn new(input: &[Instruction]) -> Self {
        let program: Vec<Instruction> = input.to_vec();
        let blocks = find_basic_blocks(&program);
        let deps = analyze_dependencies(&program, &blocks);
        let mii = min_initiation_interval(&program, &blocks);
        let len = program.len();
        Self {
            schedule: Schedule::new(len),
            ii: mii.max(1),
            loop_start: 0,
            loop_end: 0,
            stages: 0,
            new_dest: vec![None; len],
            flags: vec![RenameFlags::default(); len],
            next_non_rotating: 1,
            program,
            blocks,
            deps,
        }
    }

    fn has_loop(&self) -> bool {
        self.blocks.len() > 1
    }

    fn run(mut self) -> VliwProgram {
        self.schedule_preloop();

        if self.has_loop() {
            self.schedule_loop_body();
            self.schedule_postloop();
            let loop_len = self.loop_end - self.loop_start;
            self.stages = loop_len / self.ii;

            self.rename_loop_body_dest();
            self.rename_loop_invariant();
            self.rename_loop_body_consumers();
            self.rename_post_loop_consumers();
            self.rename_block(self.blocks[0]);
            self.rename_block(self.blocks[2]);
        } else {
            self.rename_block(self.blocks[0]);
        }
        self.rename_leftovers();

        let mut bundles = self.materialize();
        if self.has_loop() {
            self.assign_predicates(&mut bundles);
            self.compress(&mut bundles);
            self.insert_prologue(&mut bundles);
        }
        VliwProgram::from_bundles(&bundles)
    }

    /// Plain ASAP over the preheader.
    fn schedule_preloop(&mut self) {
        let bb0 = self.blocks[0];
        for i in bb0.start..bb0.end {
            let earliest = self.earliest(&self.deps[i].local, 0);
            let instr = self.program[i];
            self.schedule.place_asap(&instr, earliest);
        }
    }

    /// Max of `floor` and each scheduled producer's completion time.
    fn earliest(&self, producers: &[usize], floor: u64) -> u64 {
        producers
            .iter()
            .filter_map(|&p| {
                self.schedule
                    .time_of(p)
                    .map(|t| t + self.program[p].op.latency())
            })
            .fold(floor, u64::max)
    }

    /// Modulo scheduling of the loop body with II retry.
    fn schedule_loop_body(&mut self) {
        let bb1 = self.blocks[1];
        let body_end = bb1.end - 1;
        let loop_id = body_end;

        // Earliest body start: preheader values must be ready.
        let mut start = self.schedule.len();
        for i in bb1.start..body_end {
            start = self.earliest(&self.deps[i].loop_invariant, start);
            let preheader: Vec<usize> = self.deps[i]
                .interloop
                .iter()
                .copied()
                .filter(|&p| p < bb1.start)
                .collect();
            start = self.earliest(&preheader, start);
        }
        self.loop_start = start;

        let saved_len = self.schedule.bundles.len();
        loop {
            self.schedule.bundles.truncate(saved_len);
            for i in bb1.start..bb1.end {
                self.schedule.time_table[i] = None;
            }
            let mut reservation = ReservationTable::new(self.ii);

            let mut feasible = true;
            for i in bb1.start..body_end {
                if !self.place_modulo(&mut reservation, i) {
                    feasible = false;
                    break;
                }
            }

            if feasible {
                // The branch closes stage 0 and always becomes loop.pip.
                let branch_time = self.loop_start + self.ii - 1;
                self.schedule.grow_to(branch_time + 1);
                self.schedule.record(loop_id, branch_time, SLOT_BRANCH);
                self.program[loop_id].op = Opcode::LoopPip;
                self.program[loop_id].imm = self.loop_start as i64;

                if self.verify_interloop(bb1) {
                    break;
                }
            }

            self.ii += 1;
        }

        // Body length must be a multiple of II.
        while (self.schedule.len() - self.loop_start) % self.ii != 0 {
            self.schedule.grow_to(self.schedule.len() + 1);
        }
        self.loop_end = self.schedule.len();
    }

    /// Places one body instruction at the first time slot that is free in
    /// both the bundle and the reservation table.
    fn place_modulo(&mut self, reservation: &mut ReservationTable, i: usize) -> bool {
        let instr = self.program[i];
        if !reservation.has_open_slot(instr.op) {
            return false;
        }

        let earliest = self.earliest(&self.deps[i].local, self.loop_start);
        let mut time = earliest;
        loop {
            self.schedule.grow_to(time + 1);
            let row = (time - self.loop_start) % self.ii;
            let placed = slots_for(instr.op).iter().copied().find(|&slot| {
                self.schedule.bundles[time as usize][slot].is_none()
                    && reservation.is_open(row, slot)
            });
            if let Some(slot) = placed {
                self.schedule.record(i, time, slot);
                reservation.reserve(row, slot);
                return true;
            }
            time += 1;
        }
    }

    /// Checks `time(u) + latency(u) <= time(v) + II` for every interloop
    /// edge inside the body.
    fn verify_interloop(&self, bb1: Block) -> bool {
        for c in bb1.start..bb1.end {
            for &p in &self.deps[c].interloop {
                if !bb1.contains(p) {
                    continue;
                }
                if let (Some(tp), Some(tc)) = (self.schedule.time_of(p), self.schedule.time_of(c))
                {
                    if tp + self.program[p].op.latency() > tc + self.ii {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// ASAP over the postlude, clamped past the loop.
    fn schedule_postloop(&mut self) {
        let bb2 = self.blocks[2];
        let floor = self.schedule.len();
        for i in bb2.start..bb2.end {
            let mut earliest = self.earliest(&self.deps[i].local, floor);
            earliest = self.earliest(&self.deps[i].loop_invariant, earliest);
            earliest = self.earliest(&self.deps[i].post_loop, earliest);
            let instr = self.program[i];
            self.schedule.place_asap(&instr, earliest);
        }
    }

    /// Pipeline stage of a scheduled body instruction.
    fn stage_of(&self, id: usize) -> i64 {
        let time = self.schedule.time_of(id).expect("body instruction scheduled");
        ((time - self.loop_start) / self.ii) as i64
    }

    /// Body producers get rotating registers spaced `stages + 1` apart, in
    /// bundle order.
    fn rename_loop_body_dest(&mut self) {
        let mut current = ROTATING_BASE;
        for time in self.loop_start..self.loop_end {
            for slot in 0..NUM_SLOTS {
                if let Some(id) = self.schedule.bundles[time as usize][slot] {
                    let instr = &self.program[id];
                    if instr.op.is_producer() && !instr.writes_special() {
                        self.new_dest[id] = Some(current);
                        current += self.stages as u32 + 1;
                    }
                }
            }
        }
    }

    /// Rewrites one consumer operand from `old` to `new`, at most once.
    fn rename_operand(&mut self, consumer: usize, old: u32, new: u32) {
        let instr = &mut self.program[consumer];
        let flags = &mut self.flags[consumer];
        let reads_a = matches!(
            instr.op,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mulu
                | Opcode::Divu
                | Opcode::Remu
                | Opcode::Addi
                | Opcode::Ld
                | Opcode::St
                | Opcode::MovReg
        );
        let reads_b = matches!(
            instr.op,
            Opcode::Add | Opcode::Sub | Opcode::Mulu | Opcode::Divu | Opcode::Remu
        );

        if reads_a && instr.op_a == old && !flags.op_a {
            instr.op_a = new;
            flags.op_a = true;
        }
        if reads_b && instr.op_b == old && !flags.op_b {
            instr.op_b = new;
            flags.op_b = true;
        }
        // a store's destination field is its data read
        if instr.op == Opcode::St && instr.dest == old && !flags.dest {
            instr.dest = new;
            flags.dest = true;
        }
    }

    /// Loop-invariant producers move to fresh non-rotating registers shared
    /// by every consumer.
    fn rename_loop_invariant(&mut self) {
        let mut producers: Vec<usize> = Vec::new();
        for deps in &self.deps {
            for &p in &deps.loop_invariant {
                if !producers.contains(&p) {
                    producers.push(p);
                }
            }
        }

        let mut assigned: Vec<(usize, u32)> = Vec::new();
        for &p in &producers {
            let reg = self.next_non_rotating;
            self.next_non_rotating += 1;
            assigned.push((p, reg));
        }

        for consumer in 0..self.program.len() {
            for &p in &self.deps[consumer].loop_invariant.clone() {
                let old = self.program[p].dest;
                let new = assigned
                    .iter()
                    .find(|(q, _)| *q == p)
                    .map(|&(_, reg)| reg)
                    .expect("loop-invariant producer assigned");
                self.rename_operand(consumer, old, new);
            }
        }

        for (p, reg) in assigned {
            self.new_dest[p] = Some(reg);
        }
    }

    /// Body consumers offset the producer's rotating register by their
    /// stage distance; crossing the iteration boundary adds one, and a
    /// preheader twin is renamed onto the body producer's sequence.
    fn rename_loop_body_consumers(&mut self) {
        let bb1 = self.blocks[1];
        for c in bb1.start..bb1.end {
            for &p in &self.deps[c].local.clone() {
                if let Some(base) = self.new_dest[p] {
                    let adjustment = self.stage_of(c) - self.stage_of(p);
                    let old = self.program[p].dest;
                    self.rename_operand(c, old, offset(base, adjustment));
                }
            }

            for &p in &self.deps[c].interloop.clone() {
                if !bb1.contains(p) {
                    continue;
                }
                let base = match self.new_dest[p] {
                    Some(base) => base,
                    None => continue,
                };
                let adjustment = self.stage_of(c) - self.stage_of(p) + 1;
                let old = self.program[p].dest;
                self.rename_operand(c, old, offset(base, adjustment));

                // A preheader producer of the same register must feed the
                // first iteration through the rotating sequence.
                let twin = self.deps[c]
                    .interloop
                    .iter()
                    .copied()
                    .find(|&q| q < bb1.start && self.program[q].dest == old);
                if let Some(q) = twin {
                    self.new_dest[q] = Some(offset(base, 1 - self.stage_of(p)));
                }
            }
        }
    }

    /// Postlude consumers read producers as the last stage sees them.
    fn rename_post_loop_consumers(&mut self) {
        let bb2 = self.blocks[2];
        for c in bb2.start..bb2.end {
            for &p in &self.deps[c].post_loop.clone() {
                if let Some(base) = self.new_dest[p] {
                    let adjustment = (self.stages as i64 - 1) - self.stage_of(p);
                    let old = self.program[p].dest;
                    self.rename_operand(c, old, offset(base, adjustment));
                }
            }
        }
    }

    /// Non-loop producers get fresh non-rotating registers; local consumers
    /// follow.
    fn rename_block(&mut self, block: Block) {
        for time in 0..self.schedule.bundles.len() {
            for slot in 0..NUM_SLOTS {
                if let Some(id) = self.schedule.bundles[time][slot] {
                    if !block.contains(id) {
                        continue;
                    }
                    let instr = &self.program[id];
                    if instr.op.is_producer()
                        && !instr.writes_special()
                        && self.new_dest[id].is_none()
                    {
                        self.new_dest[id] = Some(self.next_non_rotating);
                        self.next_non_rotating += 1;
                    }
                }
            }
        }

        for time in 0..self.schedule.bundles.len() {
            for slot in 0..NUM_SLOTS {
                if let Some(id) = self.schedule.bundles[time][slot] {
                    if !block.contains(id) {
                        continue;
                    }
                    for &p in &self.deps[id].local.clone() {
                        if let Some(new) = self.new_dest[p] {
                            let old = self.program[p].dest;
                            self.rename_operand(id, old, new);
                        }
                    }
                }
            }
        }
    }

    /// Reads that no rename touched get fresh non-rotating registers.
    fn rename_leftovers(&mut self) {
        for time in 0..self.schedule.bundles.len() {
            for slot in 0..NUM_SLOTS {
                let id = match self.schedule.bundles[time][slot] {
                    Some(id) => id,
                    None => continue,
                };
                let op = self.program[id].op;
                let (reads_a, reads_b, reads_dest) = match op {
                    Opcode::Add | Opcode::Sub | Opcode::Mulu | Opcode::Divu | Opcode::Remu => {
                        (true, true, false)
                    }
                    Opcode::Addi | Opcode::Ld | Opcode::MovReg => (true, false, false),
                    Opcode::St => (true, false, true),
                    _ => (false, false, false),
                };
                if reads_a && !self.flags[id].op_a {
                    self.flags[id].op_a = true;
                    self.program[id].op_a = self.next_non_rotating;
                    self.next_non_rotating += 1;
                }
                if reads_b && !self.flags[id].op_b {
                    self.flags[id].op_b = true;
                    self.program[id].op_b = self.next_non_rotating;
                    self.next_non_rotating += 1;
                }
                if reads_dest && !self.flags[id].dest {
                    self.flags[id].dest = true;
                    self.program[id].dest = self.next_non_rotating;
                    self.next_non_rotating += 1;
                }
            }
        }
    }

    /// Resolves ids to instructions, applying destination renames.
    fn materialize(&self) -> Vec<[Instruction; NUM_SLOTS]> {
        self.schedule
            .bundles
            .iter()
            .map(|bundle| {
                let mut row = [Instruction::nop(0); NUM_SLOTS];
                for slot in 0..NUM_SLOTS {
                    if let Some(id) = bundle[slot] {
                        let mut instr = self.program[id];
                        if !instr.writes_special() {
                            if let Some(dest) = self.new_dest[id] {
                                instr.dest = dest;
                            }
                        }
                        row[slot] = instr;
                    }
                }
                row
            })
            .collect()
    }

    /// Stage k of the body runs under predicate `p(32 + k)`.
    fn assign_predicates(&self, bundles: &mut [[Instruction; NUM_SLOTS]]) {
        for time in self.loop_start..self.loop_end {
            let stage = (time - self.loop_start) / self.ii;
            for instr in bundles[time as usize].iter_mut() {
                if !matches!(instr.op, Opcode::Nop | Opcode::LoopPip) {
                    instr.pred = Some(ROTATING_BASE + stage as u32);
                }
            }
        }
    }

    /// Folds later stages into the first II bundles and drops them.
    fn compress(&self, bundles: &mut Vec<[Instruction; NUM_SLOTS]>) {
        for stage in 1..self.stages {
            for row in 0..self.ii {
                let from = (self.loop_start + stage * self.ii + row) as usize;
                let to = (self.loop_start + row) as usize;
                for slot in 0..NUM_SLOTS {
                    if bundles[from][slot].op != Opcode::Nop {
                        debug_assert_eq!(bundles[to][slot].op, Opcode::Nop);
                        bundles[to][slot] = bundles[from][slot];
                    }
                }
            }
        }
        bundles.drain((self.loop_start + self.ii) as usize..self.loop_end as usize);
    }

    /// Places `mov p32, true` and `mov EC, stages - 1` just before the
    /// kernel; overflow goes into a fresh bundle and bumps the branch
    /// target.
    fn insert_prologue(&self, bundles: &mut Vec<[Instruction; NUM_SLOTS]>) {
        let mut mov_ec = Instruction::nop(0);
        mov_ec.op = Opcode::MovImm;
        mov_ec.dest = EC_ID;
        mov_ec.imm = self.stages as i64 - 1;

        let mut mov_pred = Instruction::nop(0);
        mov_pred.op = Opcode::MovPred;
        mov_pred.dest = ROTATING_BASE;
        mov_pred.imm = 1;

        let mut pending = vec![mov_ec, mov_pred];

        if self.loop_start > 0 {
            let before = &mut bundles[self.loop_start as usize - 1];
            for slot in [SLOT_ALU0, SLOT_ALU1] {
                if !pending.is_empty() && before[slot].op == Opcode::Nop {
                    before[slot] = pending.remove(0);
                }
            }
        }

        if !pending.is_empty() {
            let mut fresh = [Instruction::nop(0); NUM_SLOTS];
            for (slot, instr) in [SLOT_ALU0, SLOT_ALU1].into_iter().zip(pending) {
                fresh[slot] = instr;
            }
            bundles.insert(self.loop_start as usize, fresh);

            // the kernel moved down one bundle
            for bundle in bundles.iter_mut() {
                if bundle[SLOT_BRANCH].op == Opcode::LoopPip {
                    bundle[SLOT_BRANCH].imm += 1;
                    break;
                }
            }
        }
    }
}

/// Applies a signed stage offset to a rotating register index.
fn offset(base: u32, adjustment: i64) -> u32 {
    (base as i64 + adjustment) as u32
}
