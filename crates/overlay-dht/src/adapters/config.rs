use crate::domain::{KademliaConfig, OverlayConfig};
use crate::ports::ConfigProvider;

// ============================================================================
// StaticConfigProvider - Config assembled in code
// ============================================================================

/// Static configuration provider.
///
/// Useful for tests and embedding. For deployments, use `TomlConfigProvider`.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    kademlia: KademliaConfig,
    overlay: OverlayConfig,
}

impl StaticConfigProvider {
    /// Create with default configs and no seeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the seed addresses.
    #[must_use]
    pub fn with_bootstrap_nodes(mut self, nodes: Vec<String>) -> Self {
        self.overlay.seeds = nodes;
        self
    }

    /// Set the Kademlia config.
    #[must_use]
    pub fn with_config(mut self, config: KademliaConfig) -> Self {
        self.kademlia = config;
        self
    }

    /// Set the overlay cache config (seeds included).
    #[must_use]
    pub fn with_overlay_config(mut self, config: OverlayConfig) -> Self {
        self.overlay = config;
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn bootstrap_nodes(&self) -> Vec<String> {
        self.overlay.seeds.clone()
    }

    fn kademlia_config(&self) -> KademliaConfig {
        self.kademlia.clone()
    }

    fn overlay_config(&self) -> OverlayConfig {
        self.overlay.clone()
    }
}

// ============================================================================
// TomlConfigProvider - Config file loading (requires "toml-config" feature)
// ============================================================================

#[cfg(feature = "toml-config")]
mod toml_config {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};
    use thiserror::Error;

    /// Configuration file structure.
    #[derive(Debug, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    struct ConfigFile {
        #[serde(default)]
        kademlia: KademliaSection,
        #[serde(default)]
        overlay: OverlaySection,
        #[serde(default)]
        transport: TransportSection,
        #[serde(default)]
        storage: StorageSection,
        #[serde(default)]
        identity: IdentitySection,
    }

    #[derive(Debug, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    struct KademliaSection {
        k: Option<usize>,
        alpha: Option<usize>,
        eviction_failure_threshold: Option<u32>,
        max_lookup_rounds: Option<usize>,
        rpc_timeout_ms: Option<u64>,
        challenge_timeout_secs: Option<u64>,
        max_query_limit: Option<usize>,
    }

    #[derive(Debug, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    struct OverlaySection {
        #[serde(default)]
        seeds: Vec<String>,
        bootstrap_seed_limit: Option<usize>,
        page_size: Option<usize>,
        refresh_interval_secs: Option<u64>,
    }

    #[derive(Debug, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    struct TransportSection {
        bind_addr: Option<String>,
        advertised_addr: Option<String>,
        connect_timeout_ms: Option<u64>,
        idle_timeout_ms: Option<u64>,
        max_streams: Option<u32>,
        max_frame_size: Option<usize>,
    }

    #[derive(Debug, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    struct StorageSection {
        backend: Option<StorageBackend>,
        path: Option<PathBuf>,
    }

    #[derive(Debug, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    struct IdentitySection {
        key_path: Option<PathBuf>,
    }

    /// Where node records are persisted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum StorageBackend {
        /// Records live in memory and are lost on restart.
        #[default]
        Memory,
        /// Records live in a RocksDB database at `path`.
        RocksDb,
    }

    /// `[transport]` section, resolved against defaults.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TransportSettings {
        /// Local UDP address the QUIC endpoint binds to.
        pub bind_addr: String,
        /// Address advertised to peers (defaults to `bind_addr`).
        pub advertised_addr: Option<String>,
        /// Dial timeout in milliseconds.
        pub connect_timeout_ms: u64,
        /// Idle connection timeout in milliseconds.
        pub idle_timeout_ms: u64,
        /// Concurrent bidirectional streams accepted per connection.
        pub max_streams: u32,
        /// Largest accepted RPC frame in bytes.
        pub max_frame_size: usize,
    }

    impl Default for TransportSettings {
        fn default() -> Self {
            Self {
                bind_addr: "0.0.0.0:7777".to_string(),
                advertised_addr: None,
                connect_timeout_ms: 5_000,
                idle_timeout_ms: 30_000,
                max_streams: 64,
                max_frame_size: 64 * 1024,
            }
        }
    }

    /// `[storage]` section, resolved against defaults.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StorageSettings {
        pub backend: StorageBackend,
        pub path: PathBuf,
    }

    impl Default for StorageSettings {
        fn default() -> Self {
            Self {
                backend: StorageBackend::Memory,
                path: PathBuf::from("./data/overlay"),
            }
        }
    }

    /// `[identity]` section. Without a key path a fresh identity is
    /// generated on every start.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct IdentitySettings {
        pub key_path: Option<PathBuf>,
    }

    /// Node-runtime settings that are not engine parameters.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct NodeSettings {
        pub transport: TransportSettings,
        pub storage: StorageSettings,
        pub identity: IdentitySettings,
    }

    /// TOML-based configuration provider.
    ///
    /// Every key is optional; missing keys fall back to the defaults.
    ///
    /// # Config File Format
    ///
    /// ```toml
    /// [kademlia]
    /// k = 20
    /// alpha = 3
    /// eviction_failure_threshold = 3
    /// max_lookup_rounds = 16
    /// rpc_timeout_ms = 5000
    /// challenge_timeout_secs = 10
    /// max_query_limit = 256
    ///
    /// [overlay]
    /// seeds = ["203.0.113.10:7777", "203.0.113.11:7777"]
    /// bootstrap_seed_limit = 1280
    /// page_size = 128
    /// refresh_interval_secs = 1800
    ///
    /// [transport]
    /// bind_addr = "0.0.0.0:7777"
    /// advertised_addr = "203.0.113.7:7777"
    ///
    /// [storage]
    /// backend = "rocksdb"
    /// path = "./data/overlay"
    ///
    /// [identity]
    /// key_path = "./data/identity.der"
    /// ```
    #[derive(Debug, Clone)]
    pub struct TomlConfigProvider {
        kademlia: KademliaConfig,
        overlay: OverlayConfig,
        settings: NodeSettings,
    }

    impl TomlConfigProvider {
        /// Load configuration from a TOML file.
        ///
        /// # Errors
        ///
        /// Returns error if the file cannot be read, parsed or validated.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
            let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
                path: path.as_ref().display().to_string(),
                error: e.to_string(),
            })?;

            Self::parse(&content)
        }

        /// Parse configuration from a TOML string.
        pub fn parse(content: &str) -> Result<Self, ConfigError> {
            let file: ConfigFile =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

            let defaults = KademliaConfig::default();
            let kc = file.kademlia;
            let kademlia = KademliaConfig {
                k: kc.k.unwrap_or(defaults.k),
                alpha: kc.alpha.unwrap_or(defaults.alpha),
                eviction_failure_threshold: kc
                    .eviction_failure_threshold
                    .unwrap_or(defaults.eviction_failure_threshold),
                max_lookup_rounds: kc.max_lookup_rounds.unwrap_or(defaults.max_lookup_rounds),
                rpc_timeout_ms: kc.rpc_timeout_ms.unwrap_or(defaults.rpc_timeout_ms),
                challenge_timeout_secs: kc
                    .challenge_timeout_secs
                    .unwrap_or(defaults.challenge_timeout_secs),
                max_query_limit: kc.max_query_limit.unwrap_or(defaults.max_query_limit),
            };

            let defaults = OverlayConfig::default();
            let oc = file.overlay;
            let overlay = OverlayConfig {
                bootstrap_seed_limit: oc
                    .bootstrap_seed_limit
                    .unwrap_or(defaults.bootstrap_seed_limit),
                page_size: oc.page_size.unwrap_or(defaults.page_size),
                refresh_interval_secs: oc
                    .refresh_interval_secs
                    .unwrap_or(defaults.refresh_interval_secs),
                seeds: oc.seeds,
            };

            let defaults = TransportSettings::default();
            let tc = file.transport;
            let transport = TransportSettings {
                bind_addr: tc.bind_addr.unwrap_or(defaults.bind_addr),
                advertised_addr: tc.advertised_addr,
                connect_timeout_ms: tc.connect_timeout_ms.unwrap_or(defaults.connect_timeout_ms),
                idle_timeout_ms: tc.idle_timeout_ms.unwrap_or(defaults.idle_timeout_ms),
                max_streams: tc.max_streams.unwrap_or(defaults.max_streams),
                max_frame_size: tc.max_frame_size.unwrap_or(defaults.max_frame_size),
            };

            let defaults = StorageSettings::default();
            let storage = StorageSettings {
                backend: file.storage.backend.unwrap_or(defaults.backend),
                path: file.storage.path.unwrap_or(defaults.path),
            };

            let provider = Self {
                kademlia,
                overlay,
                settings: NodeSettings {
                    transport,
                    storage,
                    identity: IdentitySettings {
                        key_path: file.identity.key_path,
                    },
                },
            };
            provider.validate()?;
            Ok(provider)
        }

        fn validate(&self) -> Result<(), ConfigError> {
            let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
            if self.kademlia.k == 0 {
                return invalid("kademlia.k must be positive");
            }
            if self.kademlia.alpha == 0 {
                return invalid("kademlia.alpha must be positive");
            }
            if self.kademlia.max_query_limit == 0 {
                return invalid("kademlia.max_query_limit must be positive");
            }
            if self.overlay.page_size == 0 || self.overlay.bootstrap_seed_limit == 0 {
                return invalid("overlay page sizes must be positive");
            }
            if self.settings.transport.max_frame_size < 1024 {
                return invalid("transport.max_frame_size must be at least 1024 bytes");
            }
            if self
                .settings
                .transport
                .bind_addr
                .parse::<std::net::SocketAddr>()
                .is_err()
            {
                return invalid("transport.bind_addr must be an ip:port socket address");
            }
            Ok(())
        }

        /// Transport, storage and identity settings.
        pub fn settings(&self) -> &NodeSettings {
            &self.settings
        }
    }

    impl ConfigProvider for TomlConfigProvider {
        fn bootstrap_nodes(&self) -> Vec<String> {
            self.overlay.seeds.clone()
        }

        fn kademlia_config(&self) -> KademliaConfig {
            self.kademlia.clone()
        }

        fn overlay_config(&self) -> OverlayConfig {
            self.overlay.clone()
        }
    }

    /// Errors that can occur during config loading.
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum ConfigError {
        /// File I/O error.
        #[error("failed to read {path}: {error}")]
        Io {
            /// Path of the file that failed to load.
            path: String,
            /// Error message from the I/O operation.
            error: String,
        },
        /// TOML parsing error.
        #[error("failed to parse config: {0}")]
        Parse(String),
        /// A value is out of range.
        #[error("invalid config: {0}")]
        Invalid(String),
    }
}

#[cfg(feature = "toml-config")]
pub use toml_config::{
    ConfigError, IdentitySettings, NodeSettings, StorageBackend, StorageSettings,
    TomlConfigProvider, TransportSettings,
};
