//! # Overlay Test Suite
//!
//! Cross-module scenarios for the overlay workspace.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs        # Shared builders (synthetic and QUIC nodes)
//! │   └── integration/
//! │       ├── membership.rs  # DHT engine + overlay cache on a synthetic network
//! │       └── quic.rs        # Full stack over loopback QUIC
//! └── benches/
//!     └── overlay_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p overlay-tests
//! cargo test -p overlay-tests integration::quic::
//! cargo bench -p overlay-tests
//! ```

pub mod fixtures;
pub mod integration;
