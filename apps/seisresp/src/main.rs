//! # Seisresp Binary
//!
//! Command-line entry point.
//!
//! ```text
//! seisresp eval   --response resp.json --start 0.01 --stop 50 --points 200 --db
//! seisresp check  --response resp.json
//! seisresp stages --response resp.json
//! ```

use clap::{Parser, Subcommand};
use seisresp::cli::{EvalArgs, cmd_check, cmd_eval, cmd_stages};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seisresp")]
#[command(version)]
#[command(about = "Evaluate seismic instrument responses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate responses over a frequency grid
    Eval(EvalArgs),

    /// Validate responses and report normalization and sample-rate warnings
    Check {
        /// Response JSON file (one response or an array)
        #[arg(short, long)]
        response: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the stages of each response with their sample rates
    Stages {
        /// Response JSON file (one response or an array)
        #[arg(short, long)]
        response: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Eval(args) => cmd_eval(args),
        Commands::Check { response, json } => cmd_check(response, *json),
        Commands::Stages { response } => cmd_stages(response),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "command failed");
            ExitCode::FAILURE
        }
    }
}
