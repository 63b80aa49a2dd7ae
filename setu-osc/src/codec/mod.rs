//! OSC 1.0 wire codec
//!
//! # Wire Format
//!
//! Every field is padded with NUL bytes to a multiple of 4 and all numerics
//! are big-endian.
//!
//! ```text
//! Message:
//! ┌──────────────────┬──────────────────────┬────────────────────┐
//! │ Address "/a/b\0" │ Type tags ",ifs\0"   │ Argument payloads  │
//! └──────────────────┴──────────────────────┴────────────────────┘
//!
//! Bundle:
//! ┌──────────────┬─────────────────┬──────────────┬─────────────┬─────┐
//! │ "#bundle\0"  │ Timetag (u64)   │ Size (u32)   │ Element     │ ... │
//! └──────────────┴─────────────────┴──────────────┴─────────────┴─────┘
//! ```
//!
//! Elements of a bundle are themselves messages or bundles. Decoding is
//! recursive; [`OscPacket::into_messages`] yields the depth-first processing
//! order.

mod decode;
mod encode;
mod types;

pub use decode::decode;
pub use encode::{encode_bundle, encode_message, encode_packet};
pub use types::{OscBundle, OscMessage, OscPacket, OscType, TimeTag};

/// Magic prefix identifying a bundle datagram
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Check whether a datagram is a bundle without decoding it
pub fn is_bundle(data: &[u8]) -> bool {
    data.starts_with(BUNDLE_TAG)
}

/// Round up to the next multiple of 4
#[inline]
pub(crate) const fn pad4(len: usize) -> usize {
    (len + 3) & !3
}
