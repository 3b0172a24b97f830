//! # DHT Service
//!
//! `DhtService` wires the domain `RoutingTable` and lookup shortlist to the
//! `NodeClient` port: iterative lookups, liveness pings, the table join and
//! the responder side of `Nodes.Query`. It implements the `OverlayDht`
//! driving port consumed by the overlay cache.

mod api;
mod core;
mod join;
mod liveness;
mod lookup;
mod responder;

pub use core::DhtService;
