//! HTTP server for the handwriting practice front end.
//!
//! Usage:
//!   akuru-server                      # Built-in defaults on 0.0.0.0:5000
//!   akuru-server --config akuru.toml  # Load configuration
//!
//! `AKURU_*` environment variables override the configuration file and
//! `RUST_LOG` controls log output.

use akuru::server::{create_router, AppState};
use akuru::{init_tracing, Analyzer, AnalyzerConfig};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "akuru-server")]
#[command(author, version, about = "Handwriting practice scoring server", long_about = None)]
struct Args {
    /// Analyzer configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("akuru=info");

    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => AnalyzerConfig::default(),
    }
    .with_env_overrides();
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let analyzer = Analyzer::from_config(&config).context("invalid analyzer configuration")?;
    info!(methods = ?analyzer.method_names(), "analyzer ready");

    let state = AppState::new(analyzer, config.server.random_seed)
        .with_max_image_side(config.server.max_image_side);
    let router = create_router(state);

    let bind_addr = config.server.socket_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| {
            error!("Failed to bind listener to {}: {}", bind_addr, e);
            anyhow::anyhow!("Failed to bind listener to {}: {}", bind_addr, e)
        })?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            anyhow::anyhow!("Server error: {}", e)
        })?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
