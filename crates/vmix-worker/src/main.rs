//! Adaptation worker binary.
//!
//! Usage: `vmix-worker [run.json]`

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*};

use vmix_ml_client::MlClientConfig;
use vmix_worker::logging::default_env_filter;
use vmix_worker::metrics::init_metrics;
use vmix_worker::{Pipeline, RunRequest, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = default_env_filter();

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    if let Err(e) = run().await {
        error!("Run failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let request_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("run.json"));

    info!("Starting vmix-worker");
    let metrics_handle = init_metrics();

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);
    let ml_config = MlClientConfig::from_env();

    let request = RunRequest::from_file(&request_path)
        .await
        .with_context(|| format!("loading run request {}", request_path.display()))?;

    let pipeline = Pipeline::from_config(config, &ml_config).context("building pipeline")?;
    let report = pipeline.run(&request).await?;
    let report_path = pipeline.write_report(&report).await?;

    if let Some(handle) = metrics_handle {
        let snapshot = pipeline.config().output_dir.join("metrics.prom");
        tokio::fs::write(&snapshot, handle.render())
            .await
            .with_context(|| format!("writing {}", snapshot.display()))?;
    }

    let failed: Vec<&str> = report.failed_platforms().collect();
    if failed.is_empty() {
        info!(report = %report_path.display(), "Run complete");
    } else {
        warn!(
            report = %report_path.display(),
            failed = ?failed,
            "Run finished with failed platforms"
        );
    }
    Ok(())
}
