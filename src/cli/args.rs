//! Command line argument parsing for the vantage CLI using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vantage - nearest-neighbor search over dense vectors
#[derive(Parser, Debug, Clone)]
#[command(name = "vantage")]
#[command(about = "A vantage-point tree nearest-neighbor search service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct VantageArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl VantageArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve k-NN and range queries over TCP
    Serve(ServeArgs),

    /// Convert JSONL float arrays into a vector store file
    Import(ImportArgs),

    /// Show vector store statistics
    Info(InfoArgs),
}

/// Arguments for serving queries
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// JSON configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Path to the vector store (overrides the config file)
    #[arg(short, long, value_name = "DATA_FILE")]
    pub data: Option<PathBuf>,

    /// Listen port (overrides the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// VP-tree leaf size
    #[arg(long)]
    pub leaf_size: Option<usize>,

    /// Distance metric (euclidean, cosine, manhattan)
    #[arg(short, long)]
    pub metric: Option<String>,

    /// Per-query time budget in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Answer k-NN queries with the expanding-radius fill strategy
    #[arg(long)]
    pub fill: bool,
}

/// Arguments for importing vectors
#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// Input file: one JSON float array per line
    #[arg(value_name = "INPUT_FILE")]
    pub input: PathBuf,

    /// Output vector store file
    #[arg(value_name = "OUTPUT_FILE")]
    pub output: PathBuf,

    /// Overwrite an existing output file
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for showing store statistics
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    /// Vector store file to inspect
    #[arg(value_name = "DATA_FILE")]
    pub data: PathBuf,
}
