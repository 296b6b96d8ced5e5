//! # dms-schema CLI entry point
//!
//! Parses command-line arguments, resolves configuration from the
//! environment plus flags, and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dms_startup::commands::{
    run_hash, run_load_order, run_seeds, run_startup, run_validate, HashArgs, LoadOrderArgs,
    SeedsArgs, StartupArgs, ValidateArgs,
};
use dms_startup::{cancellation_channel, CancellationSignal, StartupConfig};

/// Ed-Fi DMS schema toolchain.
///
/// Loads ApiSchema documents, builds the effective schema, and reports the
/// artifacts derived from it: the effective schema hash, resource-key seeds
/// and the resource load order.
#[derive(Parser, Debug)]
#[command(name = "dms-schema", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Directory of ApiSchema*.json files. Overrides DMS_API_SCHEMA_PATH
    /// and selects the directory origin.
    #[arg(long, global = true)]
    schema_path: Option<PathBuf>,

    /// Fingerprint file. Overrides DMS_SCHEMA_FINGERPRINT_PATH.
    #[arg(long, global = true)]
    fingerprint_path: Option<PathBuf>,

    /// Permit schema reload and upload.
    #[arg(long, global = true)]
    allow_reload: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the startup sequence: build the effective schema and verify the
    /// backend fingerprint.
    Startup(StartupArgs),

    /// Print the effective schema hash.
    Hash(HashArgs),

    /// Print resource-key seeds and their hash.
    Seeds(SeedsArgs),

    /// Print resources in dependency order.
    LoadOrder(LoadOrderArgs),

    /// Validate ApiSchema documents without building anything.
    Validate(ValidateArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn dispatch(cli: &Cli, cancel: &CancellationSignal) -> anyhow::Result<u8> {
    let config = StartupConfig::from_env()?.with_overrides(
        cli.schema_path.clone(),
        cli.fingerprint_path.clone(),
        cli.allow_reload,
    );
    tracing::debug!(?config, "resolved configuration");

    match &cli.command {
        Commands::Startup(args) => run_startup(args, &config, cancel),
        Commands::Hash(args) => run_hash(args, &config),
        Commands::Seeds(args) => run_seeds(args, &config),
        Commands::LoadOrder(args) => run_load_order(args, &config),
        Commands::Validate(args) => run_validate(args, &config),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let (cancel_tx, cancel_rx) = cancellation_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            cancel_tx.send_replace(true);
        }
    });

    let result = tokio::task::spawn_blocking(move || dispatch(&cli, &cancel_rx)).await;

    match result {
        Ok(Ok(code)) => ExitCode::from(code),
        Ok(Err(e)) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
        Err(e) => {
            tracing::error!("command panicked: {e}");
            ExitCode::from(1)
        }
    }
}
