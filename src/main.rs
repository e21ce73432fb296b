//! ipadiff
//!
//! Checks whether two iOS application packages are semantically equivalent,
//! ignoring code signing and the files that cannot be verified.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use ipadiff_engine::{
    init_with_config, render_structure_mismatch, structure_mismatch_json, DiffEngine, DiffOptions,
    OutputFormat, ToolBackend, TracingConfig,
};

/// Compare two IPA packages
#[derive(Parser, Debug)]
#[command(name = "ipadiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Report format: text or json
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// YAML file with comparison options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Set app extensions aside instead of comparing them
    #[arg(long)]
    exclude_plugins: bool,

    /// Number of worker threads (0 = one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Collaborators: native (in-process) or system (file, plutil)
    #[arg(long)]
    tools: Option<ToolBackend>,

    /// Seconds each external tool may run
    #[arg(long)]
    tool_timeout: Option<u64>,

    /// First package
    ipa1: PathBuf,

    /// Second package
    ipa2: PathBuf,
}

/// Parse command line arguments without exiting
pub fn parse_args<I, T>(args: I) -> std::result::Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)
}

fn setup_logging(verbosity: u8) {
    init_with_config(TracingConfig::from_verbosity(verbosity));
}

fn main() -> ExitCode {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    setup_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_options(cli: &Cli) -> Result<DiffOptions> {
    let mut options = match &cli.config {
        Some(path) => DiffOptions::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DiffOptions::default(),
    };

    if cli.exclude_plugins {
        options.exclude_plugins = true;
    }
    if let Some(jobs) = cli.jobs {
        options.jobs = jobs;
    }
    if let Some(tools) = cli.tools {
        options.tools = tools;
    }
    if let Some(timeout) = cli.tool_timeout {
        options.tool_timeout_secs = timeout;
    }

    options.validate()?;
    Ok(options)
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let options = load_options(cli)?;
    debug!(?options, "Options");

    info!("Comparing packages...");
    info!("  A: {:?}", cli.ipa1);
    info!("  B: {:?}", cli.ipa2);

    let engine = DiffEngine::with_defaults(options)?;

    let report = match engine.compare_archives(&cli.ipa1, &cli.ipa2) {
        Ok(report) => report,
        Err(e) => {
            let Some(diff) = e.as_structure_mismatch() else {
                return Err(e.into());
            };

            match cli.format {
                OutputFormat::Text => print!("{}", render_structure_mismatch(diff)),
                OutputFormat::Json => println!("{}", structure_mismatch_json(diff)?),
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    print!("{}", report.render(cli.format)?);

    Ok(if report.is_equal() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
