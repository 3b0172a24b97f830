//! Node sorting and selection.

use super::distance::xor_distance;
use crate::domain::{Node, NodeId};

/// Sort nodes by XOR distance to a target (closest first).
///
/// Ties cannot happen between distinct ids, so the order is total.
pub fn sort_nodes_by_distance(nodes: &mut [Node], target: &NodeId) {
    nodes.sort_by_cached_key(|n| xor_distance(&n.id, target));
}

/// Find the k closest nodes to a target from a list.
///
/// # Returns
/// Up to k nodes sorted by distance (closest first)
pub fn find_k_closest(nodes: &[Node], target: &NodeId, k: usize) -> Vec<Node> {
    let mut sorted = nodes.to_vec();
    sort_nodes_by_distance(&mut sorted, target);
    sorted.truncate(k);
    sorted
}
