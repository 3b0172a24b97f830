//! Domain Layer - Pure business logic with no I/O
//!
//! This module contains the core Kademlia logic:
//! - Node identifiers, contact records and XOR distance
//! - Routing table with k-buckets and challenge-before-evict insertion
//! - The lookup shortlist driving iterative network lookups

pub mod lookup;
pub mod routing_table;
pub mod services;
/// Core domain types (entities, values, errors)
pub mod types;

pub use lookup::*;
pub use routing_table::*;
pub use services::*;
pub use types::*;
