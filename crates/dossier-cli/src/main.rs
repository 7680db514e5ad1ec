//! # dossier CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dossier_cli::checklist::{run_checklist, ChecklistArgs};
use dossier_cli::status::{run_status, StatusArgs};
use dossier_cli::submit::{run_submit, RunArgs};

/// Exporter compliance dossiers from the command line.
///
/// The service address and token come from `DOSSIER_API_URL` and
/// `DOSSIER_API_TOKEN`.
#[derive(Parser, Debug)]
#[command(name = "dossier", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, upload and submit the dossier described by a manifest.
    Run(RunArgs),

    /// Show the status of your dossier.
    Status(StatusArgs),

    /// List the documents required for a product type.
    Checklist(ChecklistArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run_submit(&args),
        Commands::Status(args) => run_status(&args),
        Commands::Checklist(args) => run_checklist(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
