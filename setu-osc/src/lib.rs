//! SetuOSC - OSC remote-control gateway
//!
//! Bridges a controlled host object model to network clients.
//!
//! ## Protocol Architecture
//!
//! - **UDP (port 11000)**: OSC commands in, replies out to the client's host on
//!   port 11001. Drained cooperatively by [`Gateway::process_pending`].
//! - **TCP (port 11002)**: one-shot bulk transfers for payloads too large for
//!   a datagram. Served from background threads.
//!
//! ## Layers
//!
//! - [`codec`]: OSC 1.0 wire format
//! - [`dispatch`]: address → handler routing with `*` fan-out
//! - [`transport`]: UDP and TCP channels
//! - [`listen`]: property subscriptions
//! - [`host`]: capability interface for controlled objects
//! - [`component`]: conventional `get`/`set`/`start_listen`/`stop_listen` addresses

pub mod codec;
pub mod component;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod host;
pub mod listen;
pub mod transport;

// Re-export commonly used types
pub use codec::{OscMessage, OscPacket, OscType};
pub use component::{Access, ComponentApi};
pub use config::GatewayConfig;
pub use dispatch::{HandlerError, HandlerResult};
pub use error::{Error, Result};
pub use gateway::{Gateway, GatewayHandle};
pub use host::{HostError, HostObject, PropertyValue};
pub use transport::BulkPayload;
