//! Iterative lookup frontier.
//!
//! The network lookup is an explicit loop over a [`Shortlist`]: a map from
//! node id to the best-known record for it, its distance to the target and
//! where it stands in the lookup. The shortlist itself performs no I/O.

mod shortlist;

pub use shortlist::{CandidateState, Shortlist};
