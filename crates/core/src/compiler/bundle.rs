//! Bundles, schedules, and the emitted VLIW program.
//!
//! A bundle is one cycle of the machine: five slots in the fixed order
//! ALU0, ALU1, MUL, MEM, BRANCH. Schedules hold instruction *ids* (indices
//! into the program vector) so instructions can be renamed after placement;
//! rendering to text happens only at emission.

use crate::isa::{render, FuncUnit, Instruction, Opcode};

/// Slot indices within a bundle.
pub const SLOT_ALU0: usize = 0;
pub const SLOT_ALU1: usize = 1;
pub const SLOT_MUL: usize = 2;
pub const SLOT_MEM: usize = 3;
pub const SLOT_BRANCH: usize = 4;

/// Slots per bundle.
pub const NUM_SLOTS: usize = 5;

/// One cycle's worth of instruction ids; `None` renders as `nop`.
pub type Bundle = [Option<usize>; NUM_SLOTS];

/// Candidate slots for an opcode, in preference order (ALU0 before ALU1).
pub fn slots_for(op: Opcode) -> &'static [usize] {
    match op.func_unit() {
        FuncUnit::Alu => &[SLOT_ALU0, SLOT_ALU1],
        FuncUnit::Mul => &[SLOT_MUL],
        FuncUnit::Mem => &[SLOT_MEM],
        FuncUnit::Branch => &[SLOT_BRANCH],
    }
}

/// A growing bundle list plus the id-to-bundle time table.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    pub bundles: Vec<Bundle>,
    /// Bundle index per instruction id; grows when instructions are added.
    pub time_table: Vec<Option<u64>>,
}

impl Schedule {
    pub fn new(program_len: usize) -> Self {
        Self {
            bundles: Vec::new(),
            time_table: vec![None; program_len],
        }
    }

    /// Current schedule length in bundles.
    #[inline]
    pub fn len(&self) -> u64 {
        self.bundles.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Grows the bundle list with empty bundles up to `len`.
    pub fn grow_to(&mut self, len: u64) {
        while self.len() < len {
            self.bundles.push([None; NUM_SLOTS]);
        }
    }

    /// Extends the time table to cover instruction `id`.
    pub fn cover_id(&mut self, id: usize) {
        if id >= self.time_table.len() {
            self.time_table.resize(id + 1, None);
        }
    }

    /// Records a placement.
    pub fn record(&mut self, id: usize, time: u64, slot: usize) {
        self.bundles[time as usize][slot] = Some(id);
        self.cover_id(id);
        self.time_table[id] = Some(time);
    }

    /// Tries to place `instr` in bundle `time`. Returns the slot on success.
    pub fn try_place_at(&mut self, instr: &Instruction, time: u64) -> Option<usize> {
        self.grow_to(time + 1);
        for &slot in slots_for(instr.op) {
            if self.bundles[time as usize][slot].is_none() {
                self.record(instr.id, time, slot);
                return Some(slot);
            }
        }
        None
    }

    /// Greedy ASAP placement: first free compatible slot at or after
    /// `earliest`, appending fresh bundles as needed.
    pub fn place_asap(&mut self, instr: &Instruction, earliest: u64) -> u64 {
        let mut time = earliest;
        loop {
            if self.try_place_at(instr, time).is_some() {
                return time;
            }
            time += 1;
        }
    }

    /// Scheduled time of instruction `id`, if placed.
    pub fn time_of(&self, id: usize) -> Option<u64> {
        self.time_table.get(id).copied().flatten()
    }
}

/// Modulo-scheduling reservation table: II rows of five slots.
#[derive(Clone, Debug)]
pub struct ReservationTable {
    reserved: Vec<[bool; NUM_SLOTS]>,
}

impl ReservationTable {
    pub fn new(ii: u64) -> Self {
        Self {
            reserved: vec![[false; NUM_SLOTS]; ii as usize],
        }
    }

    #[inline]
    pub fn rows(&self) -> u64 {
        self.reserved.len() as u64
    }

    /// Whether `slot` is still open in row `row`.
    pub fn is_open(&self, row: u64, slot: usize) -> bool {
        !self.reserved[row as usize][slot]
    }

    pub fn reserve(&mut self, row: u64, slot: usize) {
        self.reserved[row as usize][slot] = true;
    }

    /// Whether any row still has an open slot compatible with `op`.
    pub fn has_open_slot(&self, op: Opcode) -> bool {
        self.reserved
            .iter()
            .any(|row| slots_for(op).iter().any(|&slot| !row[slot]))
    }
}

/// The emitted program: one row of five rendered slots per bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VliwProgram {
    pub rows: Vec<[String; NUM_SLOTS]>,
}

impl VliwProgram {
    /// Builds the textual program from materialized bundles.
    pub fn from_bundles(bundles: &[[Instruction; NUM_SLOTS]]) -> Self {
        let rows = bundles
            .iter()
            .map(|bundle| {
                [
                    render(&bundle[SLOT_ALU0]),
                    render(&bundle[SLOT_ALU1]),
                    render(&bundle[SLOT_MUL]),
                    render(&bundle[SLOT_MEM]),
                    render(&bundle[SLOT_BRANCH]),
                ]
            })
            .collect();
        Self { rows }
    }

    /// Number of bundles.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// JSON value form: an array of 5-element string arrays.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    serde_json::Value::Array(
                        row.iter()
                            .map(|s| serde_json::Value::String(s.clone()))
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::parse_line;

    #[test]
    fn test_alu_prefers_alu0_then_alu1() {
        let mut schedule = Schedule::new(3);
        let a = parse_line("add x1, x0, x0", 0).unwrap();
        let b = parse_line("add x2, x0, x0", 1).unwrap();
        let c = parse_line("add x3, x0, x0", 2).unwrap();

        assert_eq!(schedule.place_asap(&a, 0), 0);
        assert_eq!(schedule.place_asap(&b, 0), 0);
        // third ALU op overflows into the next bundle
        assert_eq!(schedule.place_asap(&c, 0), 1);
        assert_eq!(schedule.bundles[0][SLOT_ALU0], Some(0));
        assert_eq!(schedule.bundles[0][SLOT_ALU1], Some(1));
        assert_eq!(schedule.bundles[1][SLOT_ALU0], Some(2));
    }

    #[test]
    fn test_distinct_units_share_a_bundle() {
        let mut schedule = Schedule::new(3);
        let mul = parse_line("mulu x1, x0, x0", 0).unwrap();
        let ld = parse_line("ld x2, 0(x3)", 1).unwrap();
        let add = parse_line("add x4, x0, x0", 2).unwrap();

        schedule.place_asap(&mul, 0);
        schedule.place_asap(&ld, 0);
        schedule.place_asap(&add, 0);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.bundles[0][SLOT_MUL], Some(0));
        assert_eq!(schedule.bundles[0][SLOT_MEM], Some(1));
        assert_eq!(schedule.bundles[0][SLOT_ALU0], Some(2));
    }

    #[test]
    fn test_reservation_table() {
        let mut table = ReservationTable::new(2);
        let op = Opcode::Mulu;
        assert!(table.has_open_slot(op));
        table.reserve(0, SLOT_MUL);
        assert!(table.has_open_slot(op));
        table.reserve(1, SLOT_MUL);
        assert!(!table.has_open_slot(op));
        // ALU slots are untouched
        assert!(table.has_open_slot(Opcode::Add));
    }

    #[test]
    fn test_empty_slots_render_as_nop() {
        let bundle = [Instruction::nop(0); NUM_SLOTS];
        let program = VliwProgram::from_bundles(&[bundle]);
        assert_eq!(
            program.rows[0],
            ["nop", "nop", "nop", "nop", "nop"].map(String::from)
        );
    }
}
