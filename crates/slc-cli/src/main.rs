//! Command-line driver for the compiler: parses a source file, compiles
//! it to IR, and either writes a standalone ELF executable, runs it in
//! memory, or both.

mod ir_dump;
mod selftest;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

/// An ahead-of-time compiler for a small S-expression systems language.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// The input source file.
    file: Option<PathBuf>,

    /// Compile to memory and execute it immediately.
    #[arg(long)]
    exec: bool,

    /// Write a standalone ELF64 executable to this path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the compiled intermediate representation to stdout.
    #[arg(long = "print-ir")]
    print_ir: bool,

    /// Padding, in bytes, between each emitted function's machine code.
    #[arg(long, default_value_t = 16)]
    alignment: usize,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.file.is_none() && cli.output.is_none() && !cli.exec {
        <Cli as clap::CommandFactory>::command().print_help().ok();
        println!();
        selftest::run();
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<i64> {
    let path = cli.file.as_ref().context("a source file is required")?;
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let program = slc_compile::compile_source(&text).map_err(|e| anyhow::anyhow!("{e}"))?;

    if cli.print_ir {
        print!("{}", ir_dump::dump(&program));
    }

    if let Some(output) = &cli.output {
        slc_object::write_executable(&program, output, cli.alignment)
            .with_context(|| format!("writing {}", output.display()))?;
    }

    if cli.exec {
        return slc_jit::run(&program, cli.alignment);
    }

    Ok(0)
}
