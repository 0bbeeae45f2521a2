//! Burrow container launcher CLI
//!
//! Runs a command inside fresh PID, mount and UTS namespaces on a private
//! root filesystem extracted from a base image.

use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = cli.runtime_config();
    let result = commands::dispatch(cli.command, &config).await;

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(exit_code(&e));
        }
    }
}

/// Log to stderr so the container's stdout stays untouched
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<burrow_core::Error>()
        .map_or(1, burrow_core::Error::exit_code)
}
