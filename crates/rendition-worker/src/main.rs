//! Video transcoding worker binary.
//!
//! Processes exactly one video and exits: `0` on success, `1` on any failure.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rendition_media::ProcessRunner;
use rendition_worker::{Adapters, Pipeline, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting rendition-worker");

    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config.redacted());

    let adapters = match Adapters::from_config(&config) {
        Ok(a) => a,
        Err(e) => {
            error!("Failed to create clients: {}", e);
            std::process::exit(1);
        }
    };

    let mut runner = ProcessRunner::new();
    if let Some(timeout) = config.tool_timeout {
        runner = runner.with_timeout(timeout);
    }

    let pipeline = Pipeline::new(&config, &runner, adapters);
    if let Err(failure) = pipeline.run().await {
        error!(
            video_id = %config.video_id,
            stage = %failure.stage,
            "Video worker failed (attempt #{}): {}",
            config.task_attempt,
            failure.error
        );
        std::process::exit(1);
    }
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,rendition=info"));

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
}
