//! Shared helpers for the integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use riscsim_core::cpu::StateSnapshot;
use riscsim_core::isa::Instruction;
use riscsim_core::{Config, Processor, Simulator};

/// Parses a program from string literals.
pub fn parse(lines: &[&str]) -> Vec<Instruction> {
    let lines: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
    riscsim_core::isa::parse_program(&lines).unwrap()
}

/// Runs a program on the out-of-order core to completion.
pub fn run_core(lines: &[&str]) -> Simulator {
    let lines: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
    let config = Config::default();
    let processor = Processor::new(&lines, &config).expect("program decodes");
    let mut sim = Simulator::new(processor, &config);
    sim.run().expect("simulation completes");
    sim
}

/// Architectural value of a logical register in the final state.
pub fn reg_value(sim: &Simulator, logical: usize) -> u64 {
    let state = &sim.processor.state;
    let physical = state.register_map[logical] as usize;
    state.physical_registers[physical]
}

/// The cycle in which the instruction at `pc` left the active list.
pub fn commit_cycle(snapshots: &[StateSnapshot], pc: u64) -> Option<usize> {
    let in_flight =
        |snap: &StateSnapshot| snap.active_list.iter().any(|entry| entry.pc == pc);
    (1..snapshots.len())
        .find(|&i| in_flight(&snapshots[i - 1]) && !in_flight(&snapshots[i]))
}

/// The register partition invariant: register-map values, active-list old
/// destinations, and the free list together name each physical register
/// exactly once.
pub fn assert_register_partition(snap: &StateSnapshot) {
    let mut seen = vec![0u32; 64];
    for &reg in &snap.register_map_table {
        seen[reg as usize] += 1;
    }
    for entry in &snap.active_list {
        seen[entry.old_destination as usize] += 1;
    }
    for &reg in &snap.free_list {
        seen[reg as usize] += 1;
    }
    for (reg, &count) in seen.iter().enumerate() {
        assert_eq!(count, 1, "physical register {} named {} times", reg, count);
    }
}
