use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use overlay_dht::adapters::NodeSettings;
use overlay_dht::{ConfigProvider, KademliaConfig, OverlayConfig, TomlConfigProvider, TransportConfig};
use tracing::info;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "OVERLAY_CONFIG";

/// Used when `OVERLAY_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "overlay.toml";

/// Everything the runtime needs, resolved from the file.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub kademlia: KademliaConfig,
    pub overlay: OverlayConfig,
    pub transport: TransportConfig,
    pub settings: NodeSettings,
}

/// Load configuration from `OVERLAY_CONFIG`.
///
/// A missing default file means built-in defaults; a missing file that was
/// named explicitly is an error.
pub fn load_config() -> Result<RuntimeConfig> {
    let (path, explicit) = match std::env::var(CONFIG_ENV) {
        Ok(path) => (PathBuf::from(path), true),
        Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let provider = if path.exists() || explicit {
        info!(path = %path.display(), "loading configuration");
        TomlConfigProvider::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?
    } else {
        info!("no configuration file, using defaults");
        TomlConfigProvider::parse("").context("failed to build default configuration")?
    };

    resolve(&provider)
}

fn resolve(provider: &TomlConfigProvider) -> Result<RuntimeConfig> {
    let settings = provider.settings().clone();
    let ts = &settings.transport;
    let transport = TransportConfig {
        bind_addr: ts
            .bind_addr
            .parse()
            .with_context(|| format!("invalid transport.bind_addr {}", ts.bind_addr))?,
        advertised_addr: ts.advertised_addr.clone(),
        connect_timeout: Duration::from_millis(ts.connect_timeout_ms),
        idle_timeout: Duration::from_millis(ts.idle_timeout_ms),
        max_streams: ts.max_streams,
        max_frame_size: ts.max_frame_size,
    };

    Ok(RuntimeConfig {
        kademlia: provider.kademlia_config(),
        overlay: provider.overlay_config(),
        transport,
        settings,
    })
}
