//! Simulation driver: cycle loop and snapshot collection.
//!
//! Wraps a [`Processor`] and runs it to completion, recording the visible
//! state at the end of every cycle. Snapshot 0 is the initial state.

/// JSON program file loading and output writing.
pub mod loader;

use crate::common::error::SimError;
use crate::config::Config;
use crate::cpu::{Processor, StateSnapshot};

/// Snapshot-collecting driver around the out-of-order core.
pub struct Simulator {
    pub processor: Processor,
    snapshots: Vec<StateSnapshot>,
    max_cycles: u64,
}

impl Simulator {
    /// Builds a simulator over an already-constructed processor.
    pub fn new(processor: Processor, config: &Config) -> Self {
        let snapshots = vec![processor.snapshot()];
        Self {
            processor,
            snapshots,
            max_cycles: config.sim.max_cycles,
        }
    }

    /// Runs the program to completion, one snapshot per cycle.
    ///
    /// Stops with [`SimError::CycleLimit`] if the configured cap is reached
    /// first.
    pub fn run(&mut self) -> Result<(), SimError> {
        while !self.processor.is_done() {
            if self.processor.stats.cycles >= self.max_cycles {
                return Err(SimError::CycleLimit {
                    cycles: self.processor.stats.cycles,
                });
            }
            self.processor.step()?;
            self.snapshots.push(self.processor.snapshot());
        }
        Ok(())
    }

    /// The per-cycle snapshot log (element 0 = initial state).
    pub fn snapshots(&self) -> &[StateSnapshot] {
        &self.snapshots
    }

    /// The snapshot log as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.snapshots).expect("snapshots serialize")
    }
}
