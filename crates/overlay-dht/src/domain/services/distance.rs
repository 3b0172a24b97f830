//! Kademlia distance calculations.

use crate::domain::{Distance, NodeId, NODE_ID_LEN};

/// Calculate the XOR distance between two NodeIds.
///
/// Symmetric, zero only for identical ids, and ordered so that ids sharing
/// fewer leading bits are strictly farther apart.
pub fn xor_distance(a: &NodeId, b: &NodeId) -> Distance {
    let mut out = [0u8; NODE_ID_LEN];
    for (o, (x, y)) in out.iter_mut().zip(a.as_bytes().iter().zip(b.as_bytes().iter())) {
        *o = x ^ y;
    }
    Distance(out)
}

/// Number of leading bits two ids have in common (256 when equal).
#[inline]
pub fn common_prefix_len(a: &NodeId, b: &NodeId) -> usize {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    for i in 0..NODE_ID_LEN {
        let xor = a_bytes[i] ^ b_bytes[i];
        if xor != 0 {
            return i * 8 + xor.leading_zeros() as usize;
        }
    }

    NODE_ID_LEN * 8
}

/// Bucket holding `remote` in the routing table of `local`.
///
/// Bucket `i` holds ids sharing exactly `i` leading bits with the local id.
/// `None` for the local id itself, which is never stored.
#[inline]
pub fn bucket_index(local: &NodeId, remote: &NodeId) -> Option<usize> {
    let cpl = common_prefix_len(local, remote);
    (cpl < NODE_ID_LEN * 8).then_some(cpl)
}
