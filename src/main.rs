//! # larynx
//!
//! Generation service binary. Binds the HTTP server first, then loads the
//! configured backend in the background and serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use larynx_core::ServiceHealthState;
use larynx_engine::GenerationEndpoint;
use larynx_llm::{BackendChoice, BackendConfig, ENGINE_AVAILABLE};
use larynx_server::ServerConfig;
use larynx_telemetry::{LogFormat, TelemetryConfig};

/// Text generation service with a rule-based fallback.
#[derive(Parser, Debug)]
#[command(name = "larynx", about = "Text generation service")]
struct Cli {
    /// Host to bind.
    #[arg(long, env = "LARYNX_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Backend to serve with: model, rules or auto.
    #[arg(long, env = "LARYNX_BACKEND", default_value = "auto")]
    backend: BackendChoice,

    /// Directory holding model weights. Created if absent.
    #[arg(long, env = "LARYNX_MODEL_DIR", default_value = "/app/models")]
    model_dir: PathBuf,

    /// GGUF weights file inside the model directory.
    #[arg(
        long,
        env = "LARYNX_MODEL_FILE",
        default_value = "deepseek-coder-1.3b-instruct.Q4_K_M.gguf"
    )]
    model_file: String,

    /// Identifier reported in responses when the model serves.
    #[arg(long, env = "LARYNX_MODEL_NAME", default_value = "deepseek-coder-1.3b-instruct")]
    model_name: String,

    /// Context window in tokens.
    #[arg(long, env = "LARYNX_N_CTX", default_value = "2048")]
    context_window: usize,

    /// CPU threads for inference.
    #[arg(long, env = "LARYNX_THREADS", default_value = "4")]
    threads: usize,

    /// Fixed seed for rule-based reply selection.
    #[arg(long, env = "LARYNX_RULES_SEED")]
    rules_seed: Option<u64>,

    /// Log level (RUST_LOG takes precedence).
    #[arg(long, env = "LARYNX_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Log output format: json or pretty.
    #[arg(long, env = "LARYNX_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,
}

impl Cli {
    fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            choice: self.backend,
            model_dir: self.model_dir.clone(),
            model_file: self.model_file.clone(),
            model_name: self.model_name.clone(),
            context_window: self.context_window,
            rules_seed: self.rules_seed,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The inference thread pool reads this on first use.
    if std::env::var_os("RAYON_NUM_THREADS").is_none() {
        std::env::set_var("RAYON_NUM_THREADS", cli.threads.max(1).to_string());
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let telemetry = larynx_telemetry::init_telemetry(TelemetryConfig {
        log_level: cli.log_level,
        format: cli.log_format,
        ..Default::default()
    });

    tracing::info!(
        backend = %cli.backend,
        engine_available = ENGINE_AVAILABLE,
        "starting larynx"
    );

    let health = Arc::new(ServiceHealthState::new());
    let endpoint = Arc::new(GenerationEndpoint::new(
        Arc::clone(&health),
        telemetry.metrics(),
    ));

    let config = ServerConfig {
        host: cli.host.clone(),
        port: cli.port,
        engine_available: ENGINE_AVAILABLE,
        ..Default::default()
    };
    let handle = larynx_server::start(config, endpoint)
        .await
        .with_context(|| format!("Failed to bind {}:{}", cli.host, cli.port))?;

    let backend_config = cli.backend_config();
    let loader_health = Arc::clone(&health);
    tokio::spawn(async move {
        let readiness = larynx_llm::resolve(&backend_config).await;
        if loader_health.initialize(readiness).is_err() {
            tracing::warn!("health state already initialized");
        }
        let snapshot = loader_health.snapshot();
        tracing::info!(
            ready = snapshot.ready,
            detail = %snapshot.detail,
            fallback_cause = snapshot.fallback_cause.map(|cause| cause.as_str()),
            backend = loader_health.backend_name(),
            "backend initialization finished"
        );
    });

    tracing::info!(port = handle.port, "larynx ready for requests");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}
