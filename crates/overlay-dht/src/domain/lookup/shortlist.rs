//! Shortlist state machine for iterative lookups.

use std::collections::HashMap;

use crate::domain::{xor_distance, Distance, Node, NodeId};

/// Where a candidate stands in the lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    /// Known but not asked yet.
    Pending,
    /// Asked in the current round, answer outstanding.
    InFlight,
    /// Answered.
    Queried,
    /// Did not answer; never considered again.
    Failed,
}

#[derive(Debug, Clone)]
struct Candidate {
    node: Node,
    distance: Distance,
    state: CandidateState,
    /// Record came from our own routing table rather than a peer's answer.
    local: bool,
}

impl Candidate {
    /// Reported records may only replace reported, unasked ones.
    fn replaceable(&self) -> bool {
        !self.local && self.state == CandidateState::Pending
    }
}

/// Candidates of one lookup, keyed by node id.
#[derive(Debug, Clone)]
pub struct Shortlist {
    target: NodeId,
    local_id: NodeId,
    k: usize,
    candidates: HashMap<NodeId, Candidate>,
}

impl Shortlist {
    /// Empty shortlist for a lookup of `target` run by `local_id`.
    pub fn new(target: NodeId, local_id: NodeId, k: usize) -> Self {
        Self {
            target,
            local_id,
            k,
            candidates: HashMap::new(),
        }
    }

    /// Lookup target.
    pub fn target(&self) -> &NodeId {
        &self.target
    }

    /// Seed with records from the local routing table.
    ///
    /// These are never overwritten by records reported by peers.
    pub fn seed<I: IntoIterator<Item = Node>>(&mut self, nodes: I) -> usize {
        let mut added = 0;
        for node in nodes {
            if node.id == self.local_id {
                continue;
            }
            let distance = xor_distance(&node.id, &self.target);
            match self.candidates.get_mut(&node.id) {
                Some(existing) => {
                    existing.node = node;
                    existing.local = true;
                }
                None => {
                    self.candidates.insert(
                        node.id,
                        Candidate {
                            node,
                            distance,
                            state: CandidateState::Pending,
                            local: true,
                        },
                    );
                    added += 1;
                }
            }
        }
        added
    }

    /// Merge a batch of nodes reported by a peer.
    ///
    /// The local node is ignored. For an id already present the record with
    /// the more recent `last_seen` wins, but only while the candidate is a
    /// pending peer report: records seeded locally or belonging to a
    /// candidate already asked are kept. The candidate's state is kept.
    /// Returns the number of ids that were new.
    pub fn merge<I: IntoIterator<Item = Node>>(&mut self, nodes: I) -> usize {
        let mut added = 0;
        for node in nodes {
            if node.id == self.local_id {
                continue;
            }
            match self.candidates.get_mut(&node.id) {
                Some(existing) => {
                    if existing.replaceable() && node.last_seen > existing.node.last_seen {
                        existing.node = node;
                    }
                }
                None => {
                    let distance = xor_distance(&node.id, &self.target);
                    self.candidates.insert(
                        node.id,
                        Candidate {
                            node,
                            distance,
                            state: CandidateState::Pending,
                            local: false,
                        },
                    );
                    added += 1;
                }
            }
        }
        added
    }

    /// Live candidates (everything not failed), closest first.
    fn live_sorted(&self) -> Vec<&Candidate> {
        let mut live: Vec<&Candidate> = self
            .candidates
            .values()
            .filter(|c| c.state != CandidateState::Failed)
            .collect();
        live.sort_by(|a, b| a.distance.cmp(&b.distance));
        live
    }

    /// Pick up to `alpha` pending candidates among the `k` closest live ones
    /// and mark them in flight.
    pub fn next_round(&mut self, alpha: usize) -> Vec<Node> {
        let picked: Vec<NodeId> = self
            .live_sorted()
            .into_iter()
            .take(self.k)
            .filter(|c| c.state == CandidateState::Pending)
            .take(alpha)
            .map(|c| c.node.id)
            .collect();

        picked
            .iter()
            .filter_map(|id| {
                let candidate = self.candidates.get_mut(id)?;
                candidate.state = CandidateState::InFlight;
                Some(candidate.node.clone())
            })
            .collect()
    }

    /// Record an answer from `id`.
    pub fn mark_queried(&mut self, id: &NodeId) {
        if let Some(c) = self.candidates.get_mut(id) {
            c.state = CandidateState::Queried;
        }
    }

    /// Record that `id` failed to answer.
    pub fn mark_failed(&mut self, id: &NodeId) {
        if let Some(c) = self.candidates.get_mut(id) {
            c.state = CandidateState::Failed;
        }
    }

    /// Return in-flight candidates to pending (used when a round is abandoned).
    pub fn reset_in_flight(&mut self) {
        for c in self.candidates.values_mut() {
            if c.state == CandidateState::InFlight {
                c.state = CandidateState::Pending;
            }
        }
    }

    /// Whether no pending candidate remains among the `k` closest live ones.
    pub fn is_converged(&self) -> bool {
        !self
            .live_sorted()
            .into_iter()
            .take(self.k)
            .any(|c| c.state == CandidateState::Pending)
    }

    /// Distance of the closest live candidate.
    pub fn closest_distance(&self) -> Option<Distance> {
        self.live_sorted().first().map(|c| c.distance)
    }

    /// State of a candidate.
    pub fn state(&self, id: &NodeId) -> Option<CandidateState> {
        self.candidates.get(id).map(|c| c.state)
    }

    /// Up to `k` closest live candidates, ascending by distance.
    pub fn closest(&self) -> Vec<Node> {
        self.live_sorted()
            .into_iter()
            .take(self.k)
            .map(|c| c.node.clone())
            .collect()
    }

    /// Number of candidates tracked (including failed ones).
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check whether no candidate is tracked.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
