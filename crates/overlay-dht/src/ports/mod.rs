//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** what the DHT engine exposes to the overlay
//!   cache and the runtime
//! - **Driven Ports (Outbound):** what the engine and cache require from
//!   adapters (peer RPC, key-value storage, time, configuration)

pub mod inbound;
pub mod outbound;

pub use inbound::{JoinReport, LookupOutcome, OverlayDht};
pub use outbound::{ConfigProvider, KeyValueStore, NodeClient, TimeSource};
