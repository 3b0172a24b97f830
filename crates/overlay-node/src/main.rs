//! # Overlay Node
//!
//! Runs one member of the overlay.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`OVERLAY_CONFIG`, default `overlay.toml`)
//! 2. Load or create the node identity
//! 3. Bind the QUIC endpoint and start the `Nodes.Query` responder
//! 4. Ping the persisted membership, then bootstrap from the seeds
//! 5. Start the periodic refresh task
//!
//! Ctrl+C cancels everything and closes the endpoint.

mod config;
mod runtime;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::runtime::NodeRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = config::load_config()?;
    let runtime = NodeRuntime::start(config).await?;

    info!("Overlay node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
