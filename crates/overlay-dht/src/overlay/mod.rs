//! # Overlay Cache
//!
//! Persistent view of the network built on top of the DHT engine.
//!
//! ## Operations
//!
//! - `get` / `put` - single `Node` records keyed by the raw 32-byte id
//! - `bootstrap` - join from seeds, walk the routing table and persist every
//!   node encountered
//! - `refresh` - ping a random sample and then the whole table, persisting
//!   the nodes that answered
//! - `walk` / `warm_start` - read persisted records back after a restart
//!
//! `RefreshTask` drives `refresh` on a fixed interval until cancelled.

mod cache;
mod refresh;
mod report;

pub use cache::OverlayCache;
pub use refresh::RefreshTask;
pub use report::{BootstrapReport, RefreshReport};
