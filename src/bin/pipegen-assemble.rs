//! Standalone assembler: read a fragment stream on stdin, write the Go
//! program it describes.
//!
//! Usage:
//!   ... | pipegen-assemble
//!   ... | pipegen-assemble -o prog.go
//!
//! If no output file is specified, writes to stdout.

use clap::Parser;
use pipegen::{Assembler, AssemblerConfig, logging, write_program};
use std::io;
use std::path::PathBuf;
use std::process;

/// Assemble generation-mode fragments into a Go program.
#[derive(Parser)]
#[command(name = "pipegen-assemble", version)]
struct Cli {
    /// Write the program to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail when a fragment does not consume its predecessor's output
    #[arg(long)]
    strict: bool,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let assembler = Assembler::new(AssemblerConfig {
        strict: cli.strict,
        ..AssemblerConfig::default()
    });

    let code = match assembler.assemble_reader(io::stdin().lock()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: assembling code fragments: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = write_program(&code, cli.output.as_deref()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
