//! Bridge runtime entry point.
//!
//! Loads configuration, starts the router with a loopback target, drives one
//! batch of request/response exchanges through the bridge and prints how
//! they ended.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use bridge_runtime::{BridgeRuntime, RuntimeConfig};
use bus_telemetry::init_telemetry;

/// Exchange bridge runtime
#[derive(Parser, Debug)]
#[command(name = "bridge-runtime")]
#[command(about = "Drive request/response exchanges through the async bridge")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initiators to submit (overrides batch.requests)
    #[arg(short = 'n', long)]
    requests: Option<usize>,

    /// Correlations in flight at once (overrides batch.concurrency)
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        RuntimeConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(requests) = args.requests {
        config.batch.requests = requests;
    }
    if let Some(concurrency) = args.concurrency {
        config.batch.concurrency = concurrency;
    }

    let _telemetry = init_telemetry(config.telemetry.clone())
        .context("failed to initialize telemetry")?;

    let batch = config.batch.clone();
    let runtime = BridgeRuntime::start(config).context("failed to start bridge runtime")?;

    let report = runtime.run_batch(&batch).await;
    let (drained, stats) = runtime.shutdown().await;

    info!(
        returned = report.returned(),
        drained,
        forwarded = stats.forwarded(),
        discarded = stats.discarded,
        duplicates = stats.duplicates,
        "Run complete"
    );
    println!("{report:#?}");
    println!("{stats:#?}");

    Ok(())
}
