//! Bronzeflow CLI: run the configured ingestion pipeline once.
//!
//! Exits non-zero if any source failed, after attempting all sources and
//! printing the run summary. Log verbosity follows `RUST_LOG`.

use anyhow::Result;
use bronzeflow::{PipelineConfig, PipelineRunner};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bronzeflow",
    version,
    about = "Incremental multi-table JSON-to-Parquet ingestion"
)]
struct Cli {
    /// Path to the pipeline configuration file.
    #[arg(short, long)]
    config: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bronzeflow=info")),
        )
        .init();

    match run(&Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("bronzeflow: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let config = PipelineConfig::from_file(&cli.config)?;
    let runner = PipelineRunner::new(config)?;
    let summary = runner.run()?;
    print!("{summary}");
    Ok(summary.all_ok())
}
