//! # QUIC Transport
//!
//! Authenticated connections between overlay nodes.
//!
//! Every node owns a [`NodeIdentity`]: an Ed25519 key pair and a self-signed
//! certificate. Its `NodeId` is the SHA-256 of the raw public key carried in
//! that certificate, so any peer can derive the id from the TLS handshake
//! alone. Both sides present certificates (mutual TLS); neither side trusts a
//! CA.
//!
//! ## Dialling
//!
//! - [`TransportClient::dial_unauthenticated`] accepts whatever valid
//!   certificate the remote presents and reports the id it derives from it.
//!   Used for seeds, whose identity is not known in advance.
//! - [`TransportClient::dial_node`] performs the same handshake and then
//!   requires the derived id to equal the expected one. A different id closes
//!   the connection and yields [`TransportError::IdentityMismatch`].
//!
//! ## Endpoint
//!
//! [`OverlayEndpoint`] binds one UDP socket that serves both roles: incoming
//! connections for the `Nodes.Query` responder and outgoing dials.

mod client;
mod config;
mod endpoint;
mod error;
mod identity;
mod tls;

pub use client::{PeerConnection, TransportClient};
pub use config::TransportConfig;
pub use endpoint::OverlayEndpoint;
pub use error::TransportError;
pub use identity::{node_id_from_certificate, NodeIdentity};
pub use tls::{ALPN, SERVER_NAME};

#[cfg(test)]
mod tests;
