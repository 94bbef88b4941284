//! Out-of-order core simulator CLI.
//!
//! Reads a JSON array of assembly strings, runs the program to completion,
//! and writes one state snapshot per cycle (element 0 = initial state) as a
//! JSON array.

use anyhow::{Context, Result};
use clap::Parser;

use riscsim_core::sim::loader;
use riscsim_core::{Config, Processor, Simulator};

#[derive(Parser, Debug)]
#[command(
    name = "simulator",
    author,
    version,
    about = "Cycle-accurate out-of-order core simulator",
    long_about = "Runs a program on the out-of-order core and dumps the \
                  per-cycle state snapshots.\n\nExample:\n  simulator \
                  program.json trace.json"
)]
struct Args {
    /// Input program: JSON array of assembly strings.
    input: String,

    /// Output file for the per-cycle state snapshots.
    output: String,

    /// Print per-stage trace lines on stderr.
    #[arg(long)]
    trace: bool,

    /// Print summary statistics after the run.
    #[arg(long)]
    stats: bool,

    /// Cycle cap before the run is aborted.
    #[arg(long)]
    max_cycles: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::default();
    config.sim.trace = args.trace;
    if let Some(max_cycles) = args.max_cycles {
        config.sim.max_cycles = max_cycles;
    }

    let lines = loader::load_program(&args.input)
        .with_context(|| format!("could not read program `{}`", args.input))?;

    let processor = Processor::new(&lines, &config)
        .with_context(|| format!("could not decode program `{}`", args.input))?;

    let mut sim = Simulator::new(processor, &config);
    sim.run().context("simulation failed")?;

    loader::write_json(&args.output, &sim.to_json())
        .with_context(|| format!("could not write `{}`", args.output))?;

    if args.stats {
        sim.processor.stats.print();
    }

    Ok(())
}
