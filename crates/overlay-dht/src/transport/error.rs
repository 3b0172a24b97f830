use std::time::Duration;

use thiserror::Error;

use crate::domain::{NodeId, OverlayError};

/// Transport failures.
///
/// Converted into [`OverlayError`] at the `NodeClient` boundary: an identity
/// mismatch stays an identity mismatch, everything else becomes a
/// connectivity failure scoped to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The address could not be parsed or resolved.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The QUIC handshake failed.
    #[error("connect to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    /// The handshake did not complete within the connect timeout.
    #[error("connect to {address} timed out after {after:?}")]
    Timeout { address: String, after: Duration },

    /// The remote certificate names a different node.
    #[error("identity mismatch: expected {expected}, remote presented {actual}")]
    IdentityMismatch { expected: NodeId, actual: NodeId },

    /// A certificate could not be built or parsed.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// TLS or QUIC configuration was rejected.
    #[error("tls configuration error: {0}")]
    Tls(String),

    /// Binding or driving the local endpoint failed.
    #[error("endpoint error: {0}")]
    Endpoint(String),

    /// Reading or writing a stream failed.
    #[error("stream error: {0}")]
    Stream(String),

    /// A frame exceeded the configured maximum.
    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame body did not encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// Reading or writing the identity key file failed.
    #[error("identity file error: {0}")]
    Io(String),
}

impl TransportError {
    /// Attach the peer address to a failure before it leaves the transport.
    pub fn into_overlay(self, peer: impl ToString) -> OverlayError {
        match self {
            Self::IdentityMismatch { expected, actual } => {
                OverlayError::IdentityMismatch { expected, actual }
            }
            other => OverlayError::connectivity(peer, other),
        }
    }

    /// The address this failure concerns, when it carries one.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::InvalidAddress { address, .. }
            | Self::Connect { address, .. }
            | Self::Timeout { address, .. } => Some(address),
            _ => None,
        }
    }
}

impl From<TransportError> for OverlayError {
    fn from(err: TransportError) -> Self {
        let peer = err.address().unwrap_or("remote").to_string();
        err.into_overlay(peer)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Stream(err.to_string())
    }
}

impl From<bincode::Error> for TransportError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
