//! Global architectural constants.
//!
//! These describe the machine geometry shared by the out-of-order core and
//! the VLIW compiler: register files, queue capacities, functional units,
//! and fixed architectural addresses.

/// Number of logical (architectural) registers in the out-of-order core.
pub const LOGICAL_REGISTERS: usize = 32;

/// Number of physical registers in the out-of-order core.
///
/// Entries 0..31 initially hold the architectural registers; 32..63 form the
/// initial free list.
pub const PHYSICAL_REGISTERS: usize = 64;

/// Capacity of the active list (reorder buffer).
pub const ACTIVE_LIST_CAPACITY: usize = 32;

/// Capacity of the integer queue (reservation stations).
pub const INTEGER_QUEUE_CAPACITY: usize = 32;

/// PC loaded when an arithmetic exception is taken.
pub const EXCEPTION_VECTOR: u64 = 0x10000;

/// Total general registers visible to the VLIW compiler.
pub const VLIW_REGISTERS: u32 = 96;

/// Registers 0..31 are non-rotating; the rest rotate with the loop.
pub const NON_ROTATING_REGISTERS: u32 = 32;

/// First rotating register index (also the first stage predicate index).
pub const ROTATING_BASE: u32 = NON_ROTATING_REGISTERS;

/// Pseudo register id naming the loop counter LC.
pub const LC_ID: u32 = VLIW_REGISTERS;

/// Pseudo register id naming the epilogue counter EC.
pub const EC_ID: u32 = VLIW_REGISTERS + 1;

/// Producer-table size covering general registers plus LC and EC.
pub const REGISTERS_WITH_SPECIAL: usize = (VLIW_REGISTERS + 2) as usize;

/// ALU slots per VLIW bundle.
pub const NUM_ALU_UNITS: u32 = 2;

/// Multiplier slots per VLIW bundle.
pub const NUM_MUL_UNITS: u32 = 1;

/// Memory slots per VLIW bundle.
pub const NUM_MEM_UNITS: u32 = 1;

/// Branch slots per VLIW bundle.
pub const NUM_BRANCH_UNITS: u32 = 1;
