//! Vantage CLI binary.

use clap::Parser;
use std::process;
use vantage::cli::{args::VantageArgs, commands::execute_command};

fn main() {
    let args = VantageArgs::parse();

    let default_level = match args.verbosity() {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
