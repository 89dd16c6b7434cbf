//! Binary entrypoint: `appraisal [generate|review] [--config <path>] [--review]`
use anyhow::Result;
use appraisal_cli::{run, services, AppConfig, Args};
use appraisal_core::CancellationToken;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; plain `info` otherwise
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if args.review {
        config.review.enabled = true;
    }
    let services = services(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let report = run(args.selected(), &config, &services, &cancel).await?;
    info!(
        pipeline = %report.pipeline_id,
        stages = report.stages.len(),
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "done"
    );
    Ok(())
}
