//! # Adapters
//!
//! Concrete implementations of the driven ports.
//!
//! ## Adapters Provided
//!
//! - `InMemoryKeyValueStore` - `KeyValueStore` held in memory
//! - `RocksDbStore` - durable `KeyValueStore` (requires "rocksdb" feature)
//! - `SystemTimeSource` - production time source using the system clock
//! - `StaticConfigProvider` - configuration assembled in code
//! - `TomlConfigProvider` - configuration file loading (requires "toml-config" feature)

/// Configuration providers
pub mod config;
/// Key-value store backends
pub mod storage;
/// Time source adapters
pub mod time;

pub use config::StaticConfigProvider;
pub use storage::InMemoryKeyValueStore;
pub use time::SystemTimeSource;

#[cfg(feature = "toml-config")]
pub use config::{
    ConfigError, IdentitySettings, NodeSettings, StorageBackend, StorageSettings,
    TomlConfigProvider, TransportSettings,
};

#[cfg(feature = "rocksdb")]
pub use storage::{RocksDbConfig, RocksDbStore};
