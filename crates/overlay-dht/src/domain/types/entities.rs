//! Core Domain Entities for the overlay
//!
//! `NodeId` identifies a participant, `Node` is the contact record exchanged
//! between routing tables, lookups and the persistent cache.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::OverlayError;

/// Length of a node identifier in bytes.
pub const NODE_ID_LEN: usize = 32;

/// Longest accepted contact address: a full DNS name plus `:port`.
pub const MAX_ADDRESS_LEN: usize = 260;

/// 256-bit node identifier derived from the hash of a public key.
///
/// Equality is constant-time so that identifiers cannot be recovered through
/// timing measurements. Ordering is plain lexicographic byte order and defines
/// the ID-space order used when walking the network.
// derived_hash_with_manual_eq: equal ids have equal bytes, so hashing the
// bytes agrees with the constant-time PartialEq below.
#[allow(clippy::derived_hash_with_manual_eq)]
#[derive(Clone, Copy, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl PartialEq for NodeId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        let mut result = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl Eq for NodeId {}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl NodeId {
    /// Lowest identifier in ID-space order.
    pub const MIN: NodeId = NodeId([0u8; NODE_ID_LEN]);
    /// Highest identifier in ID-space order.
    pub const MAX: NodeId = NodeId([0xffu8; NODE_ID_LEN]);

    /// Create a NodeId from a raw 32-byte array.
    pub fn new(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a NodeId from an arbitrary byte slice.
    ///
    /// Anything other than exactly 32 bytes is malformed input.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, OverlayError> {
        let array: [u8; NODE_ID_LEN] = bytes.try_into().map_err(|_| {
            OverlayError::MalformedInput(format!(
                "node id must be {} bytes, got {}",
                NODE_ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Parse a NodeId from its hex representation.
    pub fn from_hex(s: &str) -> Result<Self, OverlayError> {
        let bytes = hex::decode(s)
            .map_err(|e| OverlayError::MalformedInput(format!("invalid node id hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Derive the identifier bound to a public key: `SHA-256(public_key)`.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut bytes = [0u8; NODE_ID_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Uniformly random identifier.
    pub fn random() -> Self {
        let mut bytes = [0u8; NODE_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Random identifier sharing exactly `prefix_len` leading bits with `self`.
    ///
    /// Used to pick a target that falls into a given bucket when refreshing
    /// the routing table. `prefix_len` is clamped to 255.
    pub fn random_with_prefix_len(&self, prefix_len: usize) -> Self {
        let prefix_len = prefix_len.min(NODE_ID_LEN * 8 - 1);
        let mut bytes = Self::random().0;
        let full_bytes = prefix_len / 8;
        let rem_bits = prefix_len % 8;

        bytes[..full_bytes].copy_from_slice(&self.0[..full_bytes]);

        // Keep the remaining prefix bits, flip the first differing bit.
        let keep_mask: u8 = if rem_bits == 0 { 0 } else { 0xff << (8 - rem_bits) };
        let flip_bit: u8 = 0x80 >> rem_bits;
        let own = self.0[full_bytes];
        let random_tail = bytes[full_bytes] & !(keep_mask | flip_bit);
        bytes[full_bytes] = (own & keep_mask) | (!own & flip_bit) | random_tail;

        Self(bytes)
    }

    /// The next identifier in ID-space order, `None` for [`NodeId::MAX`].
    pub fn successor(&self) -> Option<Self> {
        let mut bytes = self.0;
        for byte in bytes.iter_mut().rev() {
            let (next, overflow) = byte.overflowing_add(1);
            *byte = next;
            if !overflow {
                return Some(Self(bytes));
            }
        }
        None
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

/// Contact record for a participant in the overlay.
///
/// Copies of a `Node` travel between structures; the routing table owns the
/// authoritative liveness state (`last_seen`, `failure_count`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier derived from the node's public key.
    pub id: NodeId,
    /// Network address in `host:port` form.
    pub address: String,
    /// Last successful contact.
    pub last_seen: Timestamp,
    /// Consecutive failed contacts since the last success.
    pub failure_count: u32,
}

impl Node {
    /// Create a fresh contact record with no failures.
    pub fn new(id: NodeId, address: impl Into<String>, last_seen: Timestamp) -> Self {
        Self {
            id,
            address: address.into(),
            last_seen,
            failure_count: 0,
        }
    }

    /// Copy of this record marked as seen at `now` with the failure count reset.
    pub fn seen_at(&self, now: Timestamp) -> Self {
        Self {
            last_seen: now,
            failure_count: 0,
            ..self.clone()
        }
    }

    /// Reject records whose address could not be dialled or echoed back.
    pub fn validate_address(&self) -> Result<(), OverlayError> {
        validate_address(&self.address)
    }
}

/// Check that `address` is a bounded `host:port` string.
pub fn validate_address(address: &str) -> Result<(), OverlayError> {
    if address.len() > MAX_ADDRESS_LEN {
        return Err(OverlayError::MalformedInput(format!(
            "address is {} bytes (max {})",
            address.len(),
            MAX_ADDRESS_LEN
        )));
    }
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(OverlayError::MalformedInput(format!(
            "address {:?} has no port",
            address
        )));
    };
    if host.is_empty() || host.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(OverlayError::MalformedInput(format!(
            "address {:?} has an invalid host",
            address
        )));
    }
    match port.parse::<u16>() {
        Ok(port) if port != 0 => Ok(()),
        _ => Err(OverlayError::MalformedInput(format!(
            "address {:?} has an invalid port",
            address
        ))),
    }
}

/// Unix timestamp in seconds.
///
/// Values are clamped to a sane maximum so that eviction ordering cannot be
/// corrupted by a peer advertising `u64::MAX`. Decoding goes through the
/// same clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Timestamp(u64);

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self::new(secs)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to `MAX_REASONABLE`.
    pub fn new(secs: u64) -> Self {
        Self(secs.min(Self::MAX_REASONABLE))
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds (saturating at `MAX_REASONABLE`).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Seconds elapsed between `self` and a later `now` (zero if `now` is earlier).
    pub fn age_at(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }
}
