//! Socket-level scenarios against a running gateway
//!
//! Every test binds its own gateway on loopback ephemeral ports, so tests
//! run in parallel without port clashes.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration -- --nocapture
//! ```

mod bulk;
mod harness;
mod listen;
mod udp;
