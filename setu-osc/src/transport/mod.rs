//! Network channels
//!
//! - [`udp`]: non-blocking command/reply datagram channel, drained by the tick
//! - [`tcp`]: one-shot bulk-transfer side channel with its own accept thread

pub mod tcp;
pub mod udp;

pub use tcp::{BulkHandler, BulkLimits, BulkPayload, BulkRegistry, BulkServer};
pub use udp::{MAX_DATAGRAM_SIZE, OscSender, OscServer};
