//! Address-based dispatch engine
//!
//! # Routing
//!
//! ```text
//! incoming address
//!     │
//!     ├─ exact registration? ──────────► invoke that handler only
//!     │
//!     ├─ contains '*'? ────────────────► invoke every registration whose
//!     │                                  address starts with the pattern
//!     │                                  ('*' = one segment, [^/]+)
//!     │
//!     └─ otherwise ────────────────────► log "unknown address", drop
//! ```
//!
//! A handler that returns a non-empty tuple produces a reply message. On the
//! exact path the reply uses the request address; on the wildcard path it
//! uses the matched registered address so the client can tell the replies
//! apart.
//!
//! During wildcard fan-out, argument mismatches and unsupported capabilities
//! are expected (not every property applies to every target) and are skipped
//! silently. Any other failure is logged and fan-out continues.
//!
//! A handler that panics is treated as a failed handler: the panic is
//! caught, logged, and routing carries on.

pub mod args;
mod error;

pub use error::{ErrorKind, HandlerError};

use crate::codec::{OscMessage, OscType};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Return value of a handler: an optional reply tuple
pub type HandlerResult = Result<Option<Vec<OscType>>, HandlerError>;

/// Registered address handler
pub type Handler = Arc<dyn Fn(&[OscType]) -> HandlerResult + Send + Sync>;

/// Wildcard marker within incoming addresses
pub const WILDCARD: char = '*';

/// Destination for reply messages produced by handlers
pub trait ReplySink {
    fn reply(&self, address: &str, args: &[OscType]);
}

/// Shared registration table and router
///
/// Cloning yields another handle onto the same table.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Arc<RwLock<BTreeMap<String, Handler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same address
    pub fn register<F>(&self, address: &str, handler: F)
    where
        F: Fn(&[OscType]) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_handler(address, Arc::new(handler));
    }

    pub fn register_handler(&self, address: &str, handler: Handler) {
        if self
            .handlers
            .write()
            .insert(address.to_string(), handler)
            .is_some()
        {
            log::debug!("Replaced handler for {}", address);
        } else {
            log::trace!("Registered handler for {}", address);
        }
    }

    pub fn unregister_all(&self) {
        let mut handlers = self.handlers.write();
        log::info!("Clearing {} OSC handlers", handlers.len());
        handlers.clear();
    }

    pub fn contains(&self, address: &str) -> bool {
        self.handlers.read().contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Route a message and emit replies through `sink`
    ///
    /// Returns the number of handlers invoked (0 when the address is unknown).
    /// Handlers run without the table lock held, so they may register or
    /// clear handlers themselves.
    pub fn dispatch(&self, message: &OscMessage, sink: &dyn ReplySink) -> usize {
        let exact = self.handlers.read().get(&message.address).cloned();
        if let Some(handler) = exact {
            match invoke(&handler, &message.args) {
                Ok(reply) => send_reply(sink, &message.address, reply),
                Err(e) => log::error!("Handler for {} failed: {}", message.address, e),
            }
            return 1;
        }

        if message.address.contains(WILDCARD) {
            return self.dispatch_wildcard(message, sink);
        }

        log::error!("Unknown OSC address: {}", message.address);
        0
    }

    fn dispatch_wildcard(&self, message: &OscMessage, sink: &dyn ReplySink) -> usize {
        let pattern = match wildcard_regex(&message.address) {
            Ok(pattern) => pattern,
            Err(e) => {
                log::error!("Invalid wildcard address {}: {}", message.address, e);
                return 0;
            }
        };

        let matches: Vec<(String, Handler)> = self
            .handlers
            .read()
            .iter()
            .filter(|(address, _)| pattern.is_match(address))
            .map(|(address, handler)| (address.clone(), Handler::clone(handler)))
            .collect();

        if matches.is_empty() {
            log::error!("Unknown OSC address: {}", message.address);
            return 0;
        }

        log::debug!("{} matched {} handler(s)", message.address, matches.len());
        for (address, handler) in &matches {
            match invoke(handler, &message.args) {
                Ok(reply) => send_reply(sink, address, reply),
                Err(e) if e.is_expected_in_fan_out() => {
                    log::trace!("Skipping {} for {}: {}", address, message.address, e);
                }
                Err(e) => log::warn!("Handler for {} failed: {}", address, e),
            }
        }
        matches.len()
    }
}

fn invoke(handler: &Handler, args: &[OscType]) -> HandlerResult {
    catch_unwind(AssertUnwindSafe(|| handler(args)))
        .unwrap_or_else(|_| Err(HandlerError::Failed("handler panicked".into())))
}

fn send_reply(sink: &dyn ReplySink, address: &str, reply: Option<Vec<OscType>>) {
    if let Some(args) = reply
        && !args.is_empty()
    {
        sink.reply(address, &args);
    }
}

/// Convert a wildcard address into a start-anchored regex
///
/// Each `*` matches exactly one non-empty path segment; every other character
/// matches literally. Only the start is anchored, so `/live/song/*` also
/// reaches `/live/song/get/tempo`.
pub fn wildcard_regex(address: &str) -> Result<Regex, regex::Error> {
    let body: Vec<String> = address.split(WILDCARD).map(regex::escape).collect();
    Regex::new(&format!("^{}", body.join("[^/]+")))
}
