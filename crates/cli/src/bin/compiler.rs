//! VLIW scheduling compiler CLI.
//!
//! Reads a JSON array of assembly strings and writes two bundled schedules:
//! the non-pipelined loop schedule and the software-pipelined schedule.
//! Each output is a JSON array of 5-element string arrays in the slot order
//! ALU0, ALU1, MUL, MEM, BRANCH.

use anyhow::{Context, Result};
use clap::Parser;

use riscsim_core::compiler;
use riscsim_core::isa;
use riscsim_core::sim::loader;

#[derive(Parser, Debug)]
#[command(
    name = "compiler",
    author,
    version,
    about = "VLIW scheduling compiler",
    long_about = "Compiles a program into VLIW bundles twice: a plain loop \
                  schedule and a software-pipelined (modulo-scheduled) \
                  one.\n\nExample:\n  compiler program.json loop.json \
                  looppip.json"
)]
struct Args {
    /// Input program: JSON array of assembly strings.
    input: String,

    /// Output file for the non-pipelined schedule.
    loop_output: String,

    /// Output file for the software-pipelined schedule.
    looppip_output: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let lines = loader::load_program(&args.input)
        .with_context(|| format!("could not read program `{}`", args.input))?;

    let program = isa::parse_program(&lines)
        .with_context(|| format!("could not decode program `{}`", args.input))?;

    let loop_program = compiler::compile_loop(&program);
    loader::write_json(&args.loop_output, &loop_program.to_json())
        .with_context(|| format!("could not write `{}`", args.loop_output))?;

    let pipelined = compiler::compile_loop_pip(&program);
    loader::write_json(&args.looppip_output, &pipelined.to_json())
        .with_context(|| format!("could not write `{}`", args.looppip_output))?;

    Ok(())
}
