//! rangepack binary entry point.
//!
//! A thin wrapper around the rangepack library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Builds the fetcher and sink
//! 4. Runs the cycle, cancelling on Ctrl-C

use anyhow::{Context, Result};
use rangepack::{
    ArchiveSink, Cli, CycleDriver, DirectorySink, DiscardSink, HttpFetcher, PipelineConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::from_args();
    let config = cli.pipeline_config();

    tracing::info!(
        "Packing {} prefixes from {} ({} in flight, reclaim: {})",
        config.prefixes,
        config.base_url,
        config.concurrency,
        config.reclaim
    );

    match &cli.output_dir {
        Some(dir) => run(config, DirectorySink::new(dir), cli.summary_json).await,
        None => run(config, DiscardSink::new(), cli.summary_json).await,
    }
}

async fn run<S: ArchiveSink>(config: PipelineConfig, sink: S, summary_json: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(&config)?;
    let mut driver = CycleDriver::new(config, fetcher, sink)?;

    let token = driver.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            token.cancel();
        }
    });

    let summary = driver.run().await.context("run failed")?;

    if summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
