//! # Integration Scenarios
//!
//! Each module wires real components together; only the network is
//! synthetic in `membership`, nothing is in `quic`.

pub mod membership;
pub mod quic;
