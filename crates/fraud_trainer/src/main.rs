//! Fraudscope CLI
//!
//! Cleans the raw transaction data, attaches countries, derives features,
//! writes the processed table and trains and scores the fraud models.

use anyhow::{Context, Result};
use clap::Parser;
use fraudscope_trainer::{run, PipelineConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fraudscope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch fraud-detection feature pipeline and model trainer", long_about = None)]
struct Args {
    /// Transactions CSV [default: data/raw/Fraud_Data.csv]
    #[arg(short, long)]
    transactions: Option<PathBuf>,

    /// IP range to country CSV [default: data/raw/IpAddress_to_Country.csv]
    #[arg(long)]
    ip_ranges: Option<PathBuf>,

    /// Processed table output [default: data/processed/fraud_processed.csv]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file overriding columns and model parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Stop after writing the processed table
    #[arg(long)]
    skip_modeling: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Fraudscope v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            PipelineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(path) = args.transactions {
        config.paths.transactions = path;
    }
    if let Some(path) = args.ip_ranges {
        config.paths.ip_ranges = path;
    }
    if let Some(path) = args.output {
        config.paths.output = path;
    }
    if args.report.is_some() {
        config.paths.report = args.report;
    }
    if args.skip_modeling {
        config.modeling.enabled = false;
    }

    let report = run(&config).context("Pipeline failed")?;

    info!("═══════════════════════════════════════════");
    info!("✓ Pipeline completed successfully");
    info!("  Processed: {} ({} rows)", report.output.display(), report.processed_rows);
    info!("  BLAKE3: {}", report.output_blake3);
    for evaluation in &report.evaluations {
        info!("  {}: PR-AUC {:.4}", evaluation.model, evaluation.pr_auc);
    }
    if let Some(path) = &config.paths.report {
        info!("  Report: {}", path.display());
    }

    Ok(())
}
