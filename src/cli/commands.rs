//! Command implementations for the vantage CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Instant;

use serde::Serialize;

use crate::cli::args::{Command, ImportArgs, InfoArgs, ServeArgs, VantageArgs};
use crate::error::{Result, VantageError};
use crate::server::{SearchServer, SearchStrategy, ServerConfig};
use crate::store::VectorStore;
use crate::vector::DistanceMetric;

/// Execute a CLI command.
pub fn execute_command(args: VantageArgs) -> Result<()> {
    match &args.command {
        Command::Serve(serve_args) => serve(serve_args.clone(), &args),
        Command::Import(import_args) => import_vectors(import_args.clone(), &args),
        Command::Info(info_args) => show_info(info_args.clone()),
    }
}

/// Run the search server until interrupted.
fn serve(args: ServeArgs, cli_args: &VantageArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(data) = args.data {
        config.vector_data_path = data;
    }
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if let Some(leaf_size) = args.leaf_size {
        config.leaf_size = leaf_size;
    }
    if let Some(metric) = &args.metric {
        config.metric = DistanceMetric::parse_str(metric)?;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.query_timeout_ms = Some(timeout_ms);
    }
    if args.fill {
        config.strategy = SearchStrategy::Fill;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut server = SearchServer::new(config);
        let addr = server.start().await?;
        if cli_args.verbosity() > 0 {
            println!("listening on {addr}");
        }

        tokio::signal::ctrl_c().await?;
        server.stop().await;
        Ok(())
    })
}

/// Result structure for vector imports.
#[derive(Debug, Serialize)]
struct ImportResult {
    vectors_imported: usize,
    dimension: usize,
    duration_ms: u64,
}

/// Convert a JSONL file of float arrays into the binary store format.
fn import_vectors(args: ImportArgs, cli_args: &VantageArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        return Err(VantageError::invalid_argument(
            "output file already exists, use --force to overwrite",
        ));
    }

    let start_time = Instant::now();
    let file = File::open(&args.input)?;
    let reader = BufReader::new(file);

    let mut rows: Vec<Vec<f32>> = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: Vec<f32> = serde_json::from_str(&line).map_err(|e| {
            VantageError::invalid_argument(format!("line {}: {e}", line_num + 1))
        })?;
        rows.push(row);
    }

    let store = VectorStore::from_rows(&rows)?;
    store.save(&args.output)?;

    if cli_args.verbosity() > 0 {
        let result = ImportResult {
            vectors_imported: store.len(),
            dimension: store.dimension(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}

/// Store statistics.
#[derive(Debug, Serialize)]
struct StoreInfo {
    path: String,
    points: usize,
    dimension: usize,
    data_bytes: usize,
}

/// Print statistics about a store file.
fn show_info(args: InfoArgs) -> Result<()> {
    let store = VectorStore::load(&args.data)?;
    let info = StoreInfo {
        path: args.data.to_string_lossy().to_string(),
        points: store.len(),
        dimension: store.dimension(),
        data_bytes: store.data_bytes(),
    };
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
