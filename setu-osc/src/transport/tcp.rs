//! TCP bulk-transfer side channel
//!
//! Payloads too large for a datagram (song structure dumps, browser trees)
//! are served over a one-shot TCP exchange.
//!
//! # Protocol
//!
//! ```text
//! client                                   server
//!   │ ── connect ───────────────────────────► │
//!   │ ── "GET_ITEMS" (≤1024 bytes) ─────────► │  lookup token
//!   │ ◄── length (u32 BE) + UTF-8 payload ─── │
//!   │ ◄── close ───────────────────────────── │
//! ```
//!
//! Unknown tokens and handler failures still produce a framed response,
//! a JSON object `{"error": "..."}`. The connection is always closed after
//! one exchange.
//!
//! # Threading
//!
//! The accept loop runs on a dedicated thread for the server's lifetime and
//! spawns one worker per connection, so a stalled client only ties up its
//! own worker until the read timeout expires.

use crate::dispatch::HandlerError;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll interval of the accept loop while idle
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Largest response the client-side reader will accept
const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Data produced by a bulk handler
#[derive(Debug, Clone, PartialEq)]
pub enum BulkPayload {
    /// Sent verbatim
    Text(String),
    /// Serialized to JSON text
    Json(serde_json::Value),
}

impl BulkPayload {
    fn into_body(self) -> Result<String> {
        match self {
            BulkPayload::Text(text) => Ok(text),
            BulkPayload::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

impl From<String> for BulkPayload {
    fn from(text: String) -> Self {
        BulkPayload::Text(text)
    }
}

impl From<serde_json::Value> for BulkPayload {
    fn from(value: serde_json::Value) -> Self {
        BulkPayload::Json(value)
    }
}

/// Zero-argument payload producer
pub type BulkHandler = Arc<dyn Fn() -> std::result::Result<BulkPayload, HandlerError> + Send + Sync>;

/// Command token → bulk handler table
///
/// Cloning yields another handle onto the same table; the accept thread and
/// domain registration code share it.
#[derive(Clone, Default)]
pub struct BulkRegistry {
    handlers: Arc<RwLock<HashMap<String, BulkHandler>>>,
}

impl BulkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, token: &str, handler: F)
    where
        F: Fn() -> std::result::Result<BulkPayload, HandlerError> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .insert(token.to_string(), Arc::new(handler));
        log::info!("Registered TCP handler for command: {}", token);
    }

    pub fn get(&self, token: &str) -> Option<BulkHandler> {
        self.handlers.read().get(token).cloned()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.handlers.read().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    /// Produce the response body for a request token
    ///
    /// Never fails: misses and handler errors become JSON error objects.
    pub fn respond(&self, token: &str) -> String {
        let Some(handler) = self.get(token) else {
            log::warn!("Unknown TCP request: {}", token);
            return error_body(&format!("Unknown request: {}", token));
        };

        let produced = catch_unwind(AssertUnwindSafe(|| handler()))
            .unwrap_or_else(|_| Err(HandlerError::Failed("handler panicked".into())));

        match produced.map_err(|e| e.to_string()).and_then(|payload| {
            payload.into_body().map_err(|e| e.to_string())
        }) {
            Ok(body) => body,
            Err(message) => {
                log::error!("Error processing TCP request '{}': {}", token, message);
                error_body(&message)
            }
        }
    }
}

/// JSON error object sent in place of a payload
pub fn error_body(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

/// Write a length-prefixed frame: u32 big-endian byte count, then the bytes
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> std::io::Result<()> {
    let len = u32::try_from(body.len()).map_err(|_| {
        std::io::Error::new(
            ErrorKind::InvalidData,
            format!("frame too large: {} bytes", body.len()),
        )
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(body)?;
    writer.flush()
}

/// Read one length-prefixed frame
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_RESPONSE_SIZE {
        return Err(Error::Other(format!("Response too large: {} bytes", len)));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Client side of the protocol: send `token`, return the decoded payload text
pub fn request<A: ToSocketAddrs>(addr: A, token: &str, timeout: Duration) -> Result<String> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.write_all(token.as_bytes())?;
    let body = read_frame(&mut stream)?;
    String::from_utf8(body).map_err(|e| Error::Other(format!("Response is not UTF-8: {}", e)))
}

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct BulkLimits {
    pub read_timeout: Duration,
    pub max_request_bytes: usize,
}

impl Default for BulkLimits {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            max_request_bytes: 1024,
        }
    }
}

/// Listener plus accept thread
pub struct BulkServer {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl BulkServer {
    /// Bind and start accepting connections in the background
    pub fn start(bind: SocketAddr, registry: BulkRegistry, limits: BulkLimits) -> Result<Self> {
        let listener = TcpListener::bind(bind)
            .map_err(|e| Error::Other(format!("Failed to bind TCP {}: {}", bind, e)))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let accept_running = Arc::clone(&running);
        let accept_thread = thread::Builder::new()
            .name("bulk-accept".to_string())
            .spawn(move || accept_loop(listener, registry, limits, accept_running))?;

        log::info!("Starting TCP server for large data transfers on {}", local_addr);

        Ok(Self {
            local_addr,
            running,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and close the listener
    ///
    /// Workers already serving a request finish on their own.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                log::error!("TCP accept thread panicked");
            }
            log::info!("TCP server stopped");
        }
    }
}

impl Drop for BulkServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(
    listener: TcpListener,
    registry: BulkRegistry,
    limits: BulkLimits,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                log::info!("TCP client connected from {}", addr);
                let registry = registry.clone();
                let spawned = thread::Builder::new()
                    .name("bulk-client".to_string())
                    .spawn(move || handle_client(stream, addr, &registry, limits));
                if let Err(e) = spawned {
                    log::error!("Failed to spawn TCP worker for {}: {}", addr, e);
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                log::error!("Error accepting TCP connection: {}", e);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    // Listener dropped here, closing the socket
}

fn handle_client(mut stream: TcpStream, addr: SocketAddr, registry: &BulkRegistry, limits: BulkLimits) {
    if let Err(e) = serve_one(&mut stream, addr, registry, limits) {
        match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                log::warn!("TCP client {} timed out", addr)
            }
            ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                log::warn!("TCP client {} disconnected", addr)
            }
            _ => log::error!("Error handling TCP client {}: {}", addr, e),
        }
    }
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        log::debug!("TCP client {} shutdown: {}", addr, e);
    }
    log::info!("TCP client {} connection closed", addr);
}

fn serve_one(
    stream: &mut TcpStream,
    addr: SocketAddr,
    registry: &BulkRegistry,
    limits: BulkLimits,
) -> std::io::Result<()> {
    // Accepted sockets inherit non-blocking mode on some platforms
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(limits.read_timeout))?;
    stream.set_write_timeout(Some(limits.read_timeout))?;

    let mut buf = vec![0u8; limits.max_request_bytes];
    let len = stream.read(&mut buf)?;
    if len == 0 {
        log::debug!("TCP client {} closed before sending a request", addr);
        return Ok(());
    }

    let body = match std::str::from_utf8(&buf[..len]) {
        Ok(raw) => {
            let token = raw.trim();
            log::info!("TCP request from {}: {}", addr, token);
            registry.respond(token)
        }
        Err(_) => {
            log::warn!("TCP request from {} is not valid UTF-8", addr);
            error_body("Invalid request encoding")
        }
    };

    write_frame(stream, body.as_bytes())?;
    log::info!("TCP response sent: {} bytes", body.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn start(registry: &BulkRegistry) -> BulkServer {
        BulkServer::start(
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            registry.clone(),
            BulkLimits {
                read_timeout: Duration::from_secs(2),
                max_request_bytes: 1024,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_frame_layout() {
        let mut out = Vec::new();
        write_frame(&mut out, "héllo".as_bytes()).unwrap();
        // Length counts UTF-8 bytes, not characters
        assert_eq!(&out[..4], &6u32.to_be_bytes());
        assert_eq!(&out[4..], "héllo".as_bytes());

        let body = read_frame(&mut out.as_slice()).unwrap();
        assert_eq!(body, "héllo".as_bytes());
    }

    #[test]
    fn test_respond_variants() {
        let registry = BulkRegistry::new();
        registry.register("TEXT", || Ok(BulkPayload::Text("plain".into())));
        registry.register("JSON", || Ok(serde_json::json!([1, 2, 3]).into()));
        registry.register("FAIL", || Err(HandlerError::Failed("no song loaded".into())));
        registry.register("PANIC", || panic!("handler bug"));

        assert_eq!(registry.respond("TEXT"), "plain");
        assert_eq!(registry.respond("JSON"), "[1,2,3]");

        let fail: serde_json::Value = serde_json::from_str(&registry.respond("FAIL")).unwrap();
        assert_eq!(fail["error"], "no song loaded");

        let panicked: serde_json::Value = serde_json::from_str(&registry.respond("PANIC")).unwrap();
        assert!(panicked.get("error").is_some());

        let unknown: serde_json::Value = serde_json::from_str(&registry.respond("NOPE")).unwrap();
        assert_eq!(unknown["error"], "Unknown request: NOPE");
    }

    #[test]
    fn test_known_token_over_socket() {
        let registry = BulkRegistry::new();
        registry.register("GET_ITEMS", || {
            Ok(serde_json::json!([{"name": "Reverb"}, {"name": "Delay"}]).into())
        });
        let server = start(&registry);

        let text = request(server.local_addr(), "GET_ITEMS\n", Duration::from_secs(2)).unwrap();
        let items: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(items.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_token_then_close() {
        let registry = BulkRegistry::new();
        let server = start(&registry);

        let mut stream = TcpStream::connect(server.local_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        stream.write_all(b"MISSING").unwrap();

        let body = read_frame(&mut stream).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Unknown request: MISSING");

        // Server closes after one exchange
        let mut rest = Vec::new();
        assert_eq!(stream.read_to_end(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_registry_shared_with_running_server() {
        let registry = BulkRegistry::new();
        let server = start(&registry);

        registry.register("LATE", || Ok(BulkPayload::Text("added after start".into())));
        let text = request(server.local_addr(), "LATE", Duration::from_secs(2)).unwrap();
        assert_eq!(text, "added after start");
    }

    #[test]
    fn test_shutdown_stops_accepting() {
        let registry = BulkRegistry::new();
        let mut server = start(&registry);
        let addr = server.local_addr();
        server.shutdown();

        assert!(request(addr, "ANY", Duration::from_millis(500)).is_err());
    }
}
