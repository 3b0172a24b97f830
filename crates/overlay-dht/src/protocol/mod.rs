//! # Nodes.Query Protocol
//!
//! The single RPC of the overlay. A request names the requester, a target id
//! and a limit; the response lists up to `limit` nodes the responder knows
//! closest to the target. Answering is also an insertion: the responder
//! offers the requester to its own routing table.
//!
//! ## Wire format
//!
//! One QUIC bidirectional stream per RPC. Each direction carries exactly one
//! frame: a big-endian `u32` length followed by a bincode body. Frames over
//! the configured limit (64 KiB by default) are refused.
//!
//! ## Authentication
//!
//! The responder only accepts a request whose `requester.id` equals the id
//! derived from the client certificate of the connection it arrived on.

mod client;
mod framing;
mod messages;
mod server;

pub use client::{QuicNodeClient, DEFAULT_MAX_CACHED_CONNECTIONS};
pub use framing::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
pub use messages::{QueryRequest, QueryResponse};
pub use server::NodesServer;
