//! Home Assistant Rust Server
//!
//! Main entry point: loads the configuration directory, sets up the card
//! integrations and serves the frontend.

mod bootstrap;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "homeassistant")]
#[command(about = "Home Assistant (Rust) with Lovelace card integrations", long_about = None)]
struct Cli {
    /// Configuration directory (holds configuration.yaml and .storage)
    #[arg(default_value = "/config")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let cli = Cli::parse();
    info!("Starting Home Assistant (Rust) from {}", cli.config_dir.display());

    let hass = bootstrap::async_setup_hass(&cli.config_dir).await?;

    let addr = format!(
        "{}:{}",
        hass.config.http.server_host, hass.config.http.server_port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Home Assistant is running on http://{}", addr);

    axum::serve(listener, hass.router())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Shutting down...");
    hass.block_till_done().await;

    Ok(())
}
