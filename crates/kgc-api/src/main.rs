//! KGC API Server
//!
//! HTTP server for triple completion and named entity recognition.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use clap::Parser;
use kgc_api::{create_router, state::AppContext};
use kgc_core::config::{AppConfig, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kgc-api")]
#[command(author = "hephaex@gmail.com")]
#[command(version, about = "Knowledge graph completion API server")]
struct Args {
    /// Host to bind to (default 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (default 8081)
    #[arg(long)]
    port: Option<u16>,

    /// TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration: file, then environment, then flags
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging);

    // Model and dataset must be fully loaded before binding
    let state = AppContext::load(config.clone()).context("failed to load model and dataset")?;
    let app = create_router(Arc::new(state));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("KGC API Server starting on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("KGC API Server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{},kgc_api=debug,tower_http=debug", logging.level).into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
