//! Domain Errors for the overlay
//!
//! A cache or routing-table miss is not an error: lookups of a single record
//! return `Option`. Everything that can actually go wrong is an `OverlayError`.

use thiserror::Error;

use super::entities::NodeId;

/// Errors that can occur in overlay operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// Dial failure, RPC timeout, broken stream or an error reported by the
    /// remote. Retryable and scoped to one peer.
    #[error("connectivity failure with {peer}: {reason}")]
    Connectivity {
        /// Address or id of the peer.
        peer: String,
        /// Error description.
        reason: String,
    },

    /// An authenticated dial reached a node presenting a different identity.
    #[error("identity mismatch: expected {expected}, remote presented {actual}")]
    IdentityMismatch {
        /// Identity the caller asked for.
        expected: NodeId,
        /// Identity presented in the remote certificate.
        actual: NodeId,
    },

    /// The key-value backend failed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Invalid identifier length, zero count, undecodable record, bad address.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Attempted to add the local node to its own routing table.
    #[error("cannot add local node to routing table")]
    SelfConnection,

    /// A multi-peer operation ended with no usable result.
    #[error("no reachable peers")]
    NoReachablePeers,

    /// The operation was cancelled before producing any result.
    #[error("operation cancelled")]
    Cancelled,
}

impl OverlayError {
    /// Build a connectivity error for `peer`.
    pub fn connectivity(peer: impl ToString, reason: impl ToString) -> Self {
        Self::Connectivity {
            peer: peer.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Per-peer failures are recorded and skipped by sweeps and lookups.
    pub fn is_per_peer(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::IdentityMismatch { .. })
    }

    /// Failures that abort an enclosing bootstrap or refresh cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Errors raised by key-value store backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Underlying database reported an error.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error while opening or writing the store.
    #[error("I/O error: {0}")]
    Io(String),

    /// The store has been closed or is otherwise unusable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(OverlayError::connectivity("10.0.0.1:9090", "timeout").is_per_peer());
        assert!(OverlayError::IdentityMismatch {
            expected: NodeId::MIN,
            actual: NodeId::MAX,
        }
        .is_per_peer());
        assert!(!OverlayError::MalformedInput("x".into()).is_per_peer());

        let store: OverlayError = StoreError::Database("disk full".into()).into();
        assert!(store.is_fatal());
        assert!(!OverlayError::NoReachablePeers.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = OverlayError::connectivity("10.0.0.1:9090", "timed out");
        assert_eq!(
            err.to_string(),
            "connectivity failure with 10.0.0.1:9090: timed out"
        );
        let err: OverlayError = StoreError::Io("broken pipe".into()).into();
        assert_eq!(err.to_string(), "store failure: I/O error: broken pipe");
    }
}
