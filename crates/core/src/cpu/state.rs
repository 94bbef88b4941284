//! Processor state for the out-of-order core.
//!
//! This module defines:
//! 1. **Architectural state:** PC, physical register file, register map,
//!    busy bits, free list.
//! 2. **Micro-architectural state:** decode buffer, active list, integer
//!    queue, per-ALU latches, and the forwarding broadcast.
//! 3. **Snapshots:** A serializable copy of the visible state taken at the
//!    end of every cycle, with the exact JSON key names of the external
//!    interface.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::common::constants::{
    ACTIVE_LIST_CAPACITY, INTEGER_QUEUE_CAPACITY, LOGICAL_REGISTERS, PHYSICAL_REGISTERS,
};
use crate::common::queue::BoundedDeque;
use crate::isa::Instruction;

/// A fetched instruction waiting in the decode buffer.
#[derive(Clone, Copy, Debug)]
pub struct DecodedInstruction {
    pub pc: u64,
    pub instr: Instruction,
}

/// One in-flight instruction tracked by the active list (reorder buffer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveListEntry {
    /// Result has been written back.
    pub done: bool,
    /// Execution raised an arithmetic exception.
    pub exception: bool,
    /// Logical destination register.
    pub logical_dest: u32,
    /// Physical register previously mapped to `logical_dest`.
    pub old_dest: u32,
    /// Fetch PC (program index).
    pub pc: u64,
}

/// One source operand of an integer-queue entry.
///
/// When `ready` the tag is cleared and `value` is authoritative; otherwise
/// `tag` names the physical register whose broadcast is awaited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operand {
    pub ready: bool,
    pub tag: u32,
    pub value: u64,
}

impl Operand {
    /// An operand whose value is already available.
    pub fn ready(value: u64) -> Self {
        Self {
            ready: true,
            tag: 0,
            value,
        }
    }

    /// An operand waiting on the broadcast of `tag`.
    pub fn pending(tag: u32) -> Self {
        Self {
            ready: false,
            tag,
            value: 0,
        }
    }
}

/// One dispatched instruction waiting in the integer queue.
#[derive(Clone, Copy, Debug)]
pub struct IntegerQueueEntry {
    pub dest_reg: u32,
    pub op_a: Operand,
    pub op_b: Operand,
    pub op: crate::isa::Opcode,
    pub pc: u64,
}

/// Input latched into an ALU by the issue stage.
#[derive(Clone, Copy, Debug)]
pub struct AluInput {
    pub dest_reg: u32,
    pub op_a: u64,
    pub op_b: u64,
    pub op: crate::isa::Opcode,
    pub pc: u64,
}

/// Result of an ALU computation.
///
/// An exception does not abort the ALU; the result carries the flag to
/// commit.
#[derive(Clone, Copy, Debug)]
pub struct AluResult {
    pub dest_reg: u32,
    pub value: u64,
    pub exception: bool,
    pub pc: u64,
}

/// One ALU: a two-cycle pipe with a one-entry issue slot, a one-entry
/// result latch, and a one-entry result bus drained by commit.
#[derive(Clone, Copy, Debug, Default)]
pub struct AluState {
    pub issue_slot: Option<AluInput>,
    pub latch: Option<AluResult>,
    pub result_bus: Option<AluResult>,
}

impl AluState {
    /// Drops all in-flight work (exception flush).
    pub fn flush(&mut self) {
        self.issue_slot = None;
        self.latch = None;
        self.result_bus = None;
    }
}

/// Complete processor state.
#[derive(Clone, Debug)]
pub struct ProcessorState {
    /// Next fetch address (program index).
    pub pc: u64,
    /// 64 x 64-bit physical registers; 0..31 initially architectural.
    pub physical_registers: Vec<u64>,
    /// Decode buffer between fetch and rename.
    pub decoded: VecDeque<DecodedInstruction>,
    /// PC captured when an exception was taken.
    pub exception_pc: u64,
    /// Exception latch; while set, only rollback commits run.
    pub exception: bool,
    /// Logical to physical register mapping, initially the identity.
    pub register_map: Vec<u32>,
    /// FIFO of free physical registers, initially 32..63.
    pub free_list: BoundedDeque<u32>,
    /// One busy bit per physical register; set between rename and writeback.
    pub busy_bits: Vec<bool>,
    /// In-flight instructions in fetch order; head retires next.
    pub active_list: BoundedDeque<ActiveListEntry>,
    /// Dispatched instructions in insertion order, removed on issue.
    pub integer_queue: Vec<IntegerQueueEntry>,
    /// The parallel ALUs.
    pub alus: Vec<AluState>,
    /// Forwarding bus: snapshot of last cycle's ALU results.
    pub broadcast: Vec<AluResult>,
}

impl ProcessorState {
    /// Initial state: identity register map, physical registers 32..63 free.
    pub fn new(num_alus: usize) -> Self {
        let mut free_list = BoundedDeque::new(PHYSICAL_REGISTERS);
        for reg in LOGICAL_REGISTERS as u32..PHYSICAL_REGISTERS as u32 {
            free_list.push_back(reg);
        }
        Self {
            pc: 0,
            physical_registers: vec![0; PHYSICAL_REGISTERS],
            decoded: VecDeque::new(),
            exception_pc: 0,
            exception: false,
            register_map: (0..LOGICAL_REGISTERS as u32).collect(),
            free_list,
            busy_bits: vec![false; PHYSICAL_REGISTERS],
            active_list: BoundedDeque::new(ACTIVE_LIST_CAPACITY),
            integer_queue: Vec::with_capacity(INTEGER_QUEUE_CAPACITY),
            alus: vec![AluState::default(); num_alus],
            broadcast: Vec::new(),
        }
    }

    /// Looks up a pending tag on the forwarding bus.
    pub fn lookup_forward(&self, tag: u32) -> Option<&AluResult> {
        self.broadcast.iter().find(|r| r.dest_reg == tag)
    }

    /// Captures the externally visible state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            pc: self.pc,
            physical_register_file: self.physical_registers.clone(),
            decoded_pcs: self.decoded.iter().map(|d| d.pc).collect(),
            exception_pc: self.exception_pc,
            exception: self.exception,
            register_map_table: self.register_map.clone(),
            free_list: self.free_list.iter().copied().collect(),
            busy_bit_table: self.busy_bits.clone(),
            active_list: self
                .active_list
                .iter()
                .map(|e| ActiveListSnapshot {
                    done: e.done,
                    exception: e.exception,
                    logical_destination: e.logical_dest,
                    old_destination: e.old_dest,
                    pc: e.pc,
                })
                .collect(),
            integer_queue: self
                .integer_queue
                .iter()
                .map(|e| IntegerQueueSnapshot {
                    dest_register: e.dest_reg,
                    op_a_is_ready: e.op_a.ready,
                    op_a_reg_tag: e.op_a.tag,
                    op_a_value: e.op_a.value,
                    op_b_is_ready: e.op_b.ready,
                    op_b_reg_tag: e.op_b.tag,
                    op_b_value: e.op_b.value,
                    op: e.op.mnemonic().to_string(),
                    pc: e.pc,
                })
                .collect(),
        }
    }
}

/// Externally visible state at the end of a cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(rename = "PC")]
    pub pc: u64,
    #[serde(rename = "PhysicalRegisterFile")]
    pub physical_register_file: Vec<u64>,
    #[serde(rename = "DecodedPCs")]
    pub decoded_pcs: Vec<u64>,
    #[serde(rename = "ExceptionPC")]
    pub exception_pc: u64,
    #[serde(rename = "Exception")]
    pub exception: bool,
    #[serde(rename = "RegisterMapTable")]
    pub register_map_table: Vec<u32>,
    #[serde(rename = "FreeList")]
    pub free_list: Vec<u32>,
    #[serde(rename = "BusyBitTable")]
    pub busy_bit_table: Vec<bool>,
    #[serde(rename = "ActiveList")]
    pub active_list: Vec<ActiveListSnapshot>,
    #[serde(rename = "IntegerQueue")]
    pub integer_queue: Vec<IntegerQueueSnapshot>,
}

/// Active-list entry as serialized in snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActiveListSnapshot {
    pub done: bool,
    pub exception: bool,
    pub logical_destination: u32,
    pub old_destination: u32,
    #[serde(rename = "PC")]
    pub pc: u64,
}

/// Integer-queue entry as serialized in snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntegerQueueSnapshot {
    pub dest_register: u32,
    pub op_a_is_ready: bool,
    pub op_a_reg_tag: u32,
    pub op_a_value: u64,
    pub op_b_is_ready: bool,
    pub op_b_reg_tag: u32,
    pub op_b_value: u64,
    pub op: String,
    #[serde(rename = "PC")]
    pub pc: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ProcessorState::new(4);
        assert_eq!(state.pc, 0);
        assert_eq!(state.register_map, (0..32).collect::<Vec<u32>>());
        let free: Vec<u32> = state.free_list.iter().copied().collect();
        assert_eq!(free, (32..64).collect::<Vec<u32>>());
        assert!(state.busy_bits.iter().all(|b| !b));
        assert!(!state.exception);
    }

    #[test]
    fn test_snapshot_json_keys() {
        let state = ProcessorState::new(4);
        let value = serde_json::to_value(state.snapshot()).unwrap();
        for key in [
            "PC",
            "PhysicalRegisterFile",
            "DecodedPCs",
            "ExceptionPC",
            "Exception",
            "RegisterMapTable",
            "FreeList",
            "BusyBitTable",
            "ActiveList",
            "IntegerQueue",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
    }

    #[test]
    fn test_integer_queue_snapshot_keys() {
        let mut state = ProcessorState::new(4);
        state.integer_queue.push(IntegerQueueEntry {
            dest_reg: 32,
            op_a: Operand::ready(1),
            op_b: Operand::pending(33),
            op: crate::isa::Opcode::Add,
            pc: 0,
        });
        let value = serde_json::to_value(state.snapshot()).unwrap();
        let entry = &value["IntegerQueue"][0];
        for key in [
            "DestRegister",
            "OpAIsReady",
            "OpARegTag",
            "OpAValue",
            "OpBIsReady",
            "OpBRegTag",
            "OpBValue",
            "Op",
            "PC",
        ] {
            assert!(entry.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(entry["Op"], "add");
    }
}
