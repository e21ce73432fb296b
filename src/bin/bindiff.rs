//! bindiff
//!
//! Byte-by-byte comparison of two files, reporting the offset of every
//! differing byte.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use ipadiff_core::ComparisonResult;
use ipadiff_engine::{init_with_config, ByteComparator, TracingConfig};

/// Compare two files byte by byte
#[derive(Parser, Debug)]
#[command(name = "bindiff")]
#[command(version, about, long_about = None)]
#[command(after_help = "option -l will list all differences with offsets.")]
struct Cli {
    /// List every differing byte with its offset
    #[arg(short = 'l')]
    list: bool,

    /// Bytes read from each file at a time
    #[arg(long, default_value_t = 64 * 1024)]
    chunk_size: usize,

    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    file1: PathBuf,

    file2: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_with_config(TracingConfig::from_verbosity(cli.verbose));

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let comparator = ByteComparator::new(cli.chunk_size)?;

    let comparison = match comparator.compare_files(&cli.file1, &cli.file2) {
        Ok(comparison) => comparison,
        Err(e) if e.is_not_found() => {
            println!("Result of comparison: not found");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Result of comparison: {}", comparison.verdict());

    if let Some(offset) = comparison.first_difference {
        println!("offset differs: {:#x}", offset);
    }

    if cli.list && matches!(comparison.result, ComparisonResult::NotEqual(_)) && !comparison.diffs.is_empty() {
        println!("List of differences:");
        for entry in &comparison.diffs {
            println!("{}", entry);
        }
    }

    Ok(if comparison.is_equal() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
