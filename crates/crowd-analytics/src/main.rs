//! Batch crowd analytics over detector output
//!
//! Usage:
//!   crowd-analytics lobby.json                       - Print the report to stdout
//!   crowd-analytics --output reports/ a.json b.json  - Write <source_id>.report.json files
//!   crowd-analytics --config analytics.json --pretty lobby.json

use anyhow::{bail, Context, Result};
use clap::Parser;
use crowd_analytics::runner::{run_files, RunOptions};
use crowd_analytics::AnalyticsConfig;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "crowd-analytics")]
#[command(about = "Crowd density, hotspot, bottleneck and flow analytics", long_about = None)]
struct Cli {
    /// Detection batch JSON files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Analytics configuration JSON file
    #[arg(long, env = "CROWD_ANALYTICS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for <source_id>.report.json files (default: stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,

    /// Fail batches that contain no usable frames
    #[arg(long)]
    require_frames: bool,

    /// Dump Prometheus metrics to stderr when done
    #[arg(long)]
    print_metrics: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = telemetry::init_with_service("crowd-analytics");

    let config = match &cli.config {
        Some(path) => AnalyticsConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalyticsConfig::default(),
    }
    .with_env_overrides()
    .context("Invalid CROWD_* environment override")?;

    let options = RunOptions {
        output_dir: cli.output.clone(),
        pretty: cli.pretty,
        require_frames: cli.require_frames,
    };

    info!(inputs = cli.inputs.len(), "starting crowd analytics");

    let workers = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let results = run_files(&cli.inputs, &config, &options, workers);

    let mut failed = 0;
    for (path, result) in cli.inputs.iter().zip(results) {
        match result {
            Ok(outcome) => match &outcome.written_to {
                Some(written) => info!(
                    source_id = %outcome.source_id,
                    path = %written.display(),
                    "report written"
                ),
                None => println!("{}", outcome.rendered),
            },
            Err(e) => {
                failed += 1;
                error!(input = %path.display(), "{:#}", e);
            }
        }
    }

    if cli.print_metrics {
        let metrics = telemetry::encode_metrics().context("Failed to encode metrics")?;
        eprintln!("{}", metrics);
    }

    if failed > 0 {
        bail!("{} of {} batches failed", failed, cli.inputs.len());
    }
    Ok(())
}
