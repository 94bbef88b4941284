//! Configuration for the out-of-order core simulation.
//!
//! This module defines the tunable parameters of the simulator:
//! 1. **Defaults:** Baseline machine parameters (pipeline width, ALU count).
//! 2. **Structures:** Hierarchical config for the pipeline and the driver.
//!
//! Configuration is supplied as JSON or built with `Config::default()`.
//! Queue capacities and the register-file geometry are architectural and
//! live in [`crate::common::constants`].

use serde::Deserialize;

/// Default configuration constants.
mod defaults {
    /// Instructions fetched, renamed and committed per cycle.
    pub const PIPELINE_WIDTH: usize = 4;

    /// Number of parallel ALUs, each a two-cycle pipe.
    pub const NUM_ALUS: usize = 4;

    /// Upper bound on simulated cycles before the driver gives up.
    pub const MAX_CYCLES: u64 = 100_000;
}

/// Pipeline geometry.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fetch/rename/commit width.
    pub width: usize,
    /// Number of ALUs available to the issue stage.
    pub num_alus: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: defaults::PIPELINE_WIDTH,
            num_alus: defaults::NUM_ALUS,
        }
    }
}

/// Driver behavior.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Cycle cap; the driver stops with an error once it is reached.
    pub max_cycles: u64,
    /// Emit per-stage trace lines on stderr.
    pub trace: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_cycles: defaults::MAX_CYCLES,
            trace: false,
        }
    }
}

/// Root configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub sim: SimConfig,
}
