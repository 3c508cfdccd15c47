//! Reframe worker binary.

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{error, info};

use reframe_models::{ReframeRequest, TimeRange};
use reframe_worker::{init_tracing, run_job, Args, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing();

    if let Err(e) = run(args).await {
        error!("Reframe failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let metrics = match &args.metrics_out {
        Some(_) => Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("failed to install Prometheus recorder")?,
        ),
        None => None,
    };

    let mut config = WorkerConfig::from_env().context("invalid configuration")?;
    config.apply_args(&args);
    info!("Worker config: {:?}", config);

    let range = TimeRange::new(args.start, args.end).context("invalid segment")?;
    let mut request = ReframeRequest::new(&args.input, range).with_pipeline(config.reframe.pipeline.clone());
    if let Some(output) = &args.output {
        request = request.with_output(output);
    }

    let result = run_job(&config, request).await;

    if let (Some(handle), Some(path)) = (&metrics, &args.metrics_out) {
        write_metrics(handle, path)?;
    }

    let outcome = result?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.output_path.display());
    }
    info!(
        frames = outcome.frames_written,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "Wrote {}",
        outcome.output_path.display()
    );
    Ok(())
}

fn write_metrics(handle: &PrometheusHandle, path: &std::path::Path) -> anyhow::Result<()> {
    std::fs::write(path, handle.render())
        .with_context(|| format!("failed to write metrics to {}", path.display()))
}
