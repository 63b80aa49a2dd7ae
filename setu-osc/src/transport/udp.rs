//! UDP command/reply channel
//!
//! # Reply Addressing
//!
//! Replies never go back to the sender's ephemeral source port. The
//! protocol convention is a well-known response port on the client host:
//!
//! ```text
//! client:54321 ──── /live/song/get/tempo ────► server:11000
//! client:11001 ◄─── /live/song/get/tempo 120 ── server
//! ```
//!
//! The reply host follows the most recent sender (single implicit session),
//! and is updated *before* the datagram is dispatched so that sends made
//! during dispatch (e.g. a subscription's immediate emission) reach the
//! current client.
//!
//! # Non-blocking Drain
//!
//! [`OscServer::process_pending`] is driven by an external tick and must never
//! wait: it reads until the socket reports would-block, then returns.

use crate::codec::{self, OscType};
use crate::dispatch::{Dispatcher, ReplySink};
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;

/// Largest payload that fits a single IPv4 UDP datagram
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Receive buffer size (any datagram fits)
const RECV_BUFFER_SIZE: usize = 65_536;

/// Shared outbound handle and reply-target holder
///
/// Cloning is cheap; every clone sends from the same socket and observes the
/// same reply target.
#[derive(Clone)]
pub struct OscSender {
    inner: Arc<SenderInner>,
}

struct SenderInner {
    /// `None` once the channel has been shut down
    socket: RwLock<Option<UdpSocket>>,
    reply_target: Mutex<SocketAddr>,
    reply_port: u16,
}

impl OscSender {
    fn new(socket: UdpSocket, default_target: SocketAddr) -> Self {
        Self {
            inner: Arc::new(SenderInner {
                socket: RwLock::new(Some(socket)),
                reply_target: Mutex::new(default_target),
                reply_port: default_target.port(),
            }),
        }
    }

    /// Current implicit destination for outbound messages
    pub fn reply_target(&self) -> SocketAddr {
        *self.inner.reply_target.lock()
    }

    pub fn reply_port(&self) -> u16 {
        self.inner.reply_port
    }

    /// Point the reply target at `host` on the configured reply port
    pub fn set_reply_host(&self, host: IpAddr) {
        let target = SocketAddr::new(host, self.inner.reply_port);
        let mut current = self.inner.reply_target.lock();
        if *current != target {
            log::info!("Reply target changed: {} -> {}", *current, target);
            *current = target;
        }
    }

    /// Send to the current reply target
    pub fn send(&self, address: &str, args: &[OscType]) -> Result<()> {
        let target = self.reply_target();
        self.send_to(address, args, target)
    }

    /// Send to an explicit destination
    pub fn send_to(&self, address: &str, args: &[OscType], dest: SocketAddr) -> Result<()> {
        let bytes = codec::encode_message(address, args)?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(Error::Encoding(format!(
                "{} is {} bytes, exceeds datagram limit of {}",
                address,
                bytes.len(),
                MAX_DATAGRAM_SIZE
            )));
        }

        let guard = self.inner.socket.read();
        let socket = guard
            .as_ref()
            .ok_or_else(|| Error::Io(std::io::Error::from(ErrorKind::NotConnected)))?;
        socket.send_to(&bytes, dest)?;
        log::trace!("Sent {} ({} bytes) to {}", address, bytes.len(), dest);
        Ok(())
    }

    /// Close the socket; later sends fail with `NotConnected`
    fn close(&self) {
        self.inner.socket.write().take();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.socket.read().is_none()
    }
}

impl ReplySink for OscSender {
    fn reply(&self, address: &str, args: &[OscType]) {
        if let Err(e) = self.send(address, args) {
            log_send_error(address, &e);
        }
    }
}

/// Log a failed outbound send at a severity matching its cause
pub(crate) fn log_send_error(address: &str, e: &Error) {
    if e.is_transient() {
        log::warn!("Dropped {} (non-fatal socket error): {}", address, e);
    } else {
        log::error!("Failed to send {}: {}", address, e);
    }
}

/// Non-blocking UDP listener feeding the dispatcher
pub struct OscServer {
    socket: UdpSocket,
    sender: OscSender,
    recv_buffer: Vec<u8>,
}

impl OscServer {
    /// Bind the listen socket
    ///
    /// `default_reply` is the reply target used until the first datagram
    /// arrives; its port is the fixed reply port.
    pub fn bind(listen: SocketAddr, default_reply: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(listen)
            .map_err(|e| Error::Other(format!("Failed to bind UDP {}: {}", listen, e)))?;
        socket.set_nonblocking(true)?;
        let sender = OscSender::new(socket.try_clone()?, default_reply);

        log::info!(
            "Starting OSC server (local {}, response port {})",
            socket.local_addr()?,
            default_reply.port()
        );

        Ok(Self {
            socket,
            sender,
            recv_buffer: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn sender(&self) -> OscSender {
        self.sender.clone()
    }

    /// Drain and dispatch every queued datagram without blocking
    ///
    /// Returns the number of datagrams handled.
    pub fn process_pending(&mut self, dispatcher: &Dispatcher) -> usize {
        let mut handled = 0;
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((len, from)) => {
                    self.sender.set_reply_host(from.ip());
                    handle_datagram(&self.recv_buffer[..len], from, dispatcher, &self.sender);
                    handled += 1;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                    ) =>
                {
                    // ICMP port-unreachable from an earlier send surfaces here
                    log::warn!("Non-fatal socket error: {}", e);
                    break;
                }
                Err(e) => {
                    log::error!("Socket error: {}", e);
                    break;
                }
            }
        }
        handled
    }

    /// Notify the last client and close the socket
    ///
    /// Never fails; problems are logged.
    pub fn shutdown(self, disconnect_address: &str) {
        log::info!("Sending disconnect signal to {}", self.sender.reply_target());
        if let Err(e) = self.sender.send(disconnect_address, &[OscType::Bool(true)]) {
            log_send_error(disconnect_address, &e);
        }
        self.sender.close();
        log::info!("OSC server stopped");
    }
}

fn handle_datagram(data: &[u8], from: SocketAddr, dispatcher: &Dispatcher, sender: &OscSender) {
    let packet = match codec::decode(data) {
        Ok(packet) => packet,
        Err(e) => {
            log::error!("Dropping datagram from {}: {}", from, e);
            return;
        }
    };

    for message in packet.into_messages() {
        log::debug!("Received {} {:?} from {}", message.address, message.args, from);
        dispatcher.dispatch(&message, sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{OscBundle, OscMessage, OscPacket};
    use std::net::Ipv4Addr;
    use std::time::{Duration, Instant};

    fn localhost(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Client socket listening on its own "reply port"
    fn client() -> UdpSocket {
        let socket = UdpSocket::bind(localhost(0)).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
    }

    fn pump(server: &mut OscServer, dispatcher: &Dispatcher, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut handled = 0;
        while handled < expected && Instant::now() < deadline {
            handled += server.process_pending(dispatcher);
            std::thread::sleep(Duration::from_millis(5));
        }
        handled
    }

    fn recv(socket: &UdpSocket) -> OscMessage {
        let mut buf = [0u8; 2048];
        let (len, _) = socket.recv_from(&mut buf).unwrap();
        match codec::decode(&buf[..len]).unwrap() {
            OscPacket::Message(msg) => msg,
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_process_pending_returns_immediately_when_idle() {
        let mut server = OscServer::bind(localhost(0), localhost(9)).unwrap();
        let start = Instant::now();
        assert_eq!(server.process_pending(&Dispatcher::new()), 0);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_reply_goes_to_reply_port() {
        let client = client();
        let reply_port = client.local_addr().unwrap().port();
        // Default reply host is deliberately wrong; the sender must override it
        let mut server = OscServer::bind(
            localhost(0),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2)), reply_port),
        )
        .unwrap();
        let dispatcher = Dispatcher::new();
        dispatcher.register("/test", |_| {
            Ok(Some(vec![OscType::Int(1), OscType::Int(2), OscType::Int(3)]))
        });

        // Send from a different socket so the source port differs from the reply port
        let requester = UdpSocket::bind(localhost(0)).unwrap();
        let bytes = codec::encode_message("/test", &[]).unwrap();
        requester.send_to(&bytes, server.local_addr().unwrap()).unwrap();

        assert_eq!(pump(&mut server, &dispatcher, 1), 1);
        assert_eq!(server.sender().reply_target(), localhost(reply_port));

        let reply = recv(&client);
        assert_eq!(reply.address, "/test");
        assert_eq!(
            reply.args,
            vec![OscType::Int(1), OscType::Int(2), OscType::Int(3)]
        );
    }

    #[test]
    fn test_bundle_messages_dispatched_in_order() {
        let client = client();
        let reply_port = client.local_addr().unwrap().port();
        let mut server = OscServer::bind(localhost(0), localhost(reply_port)).unwrap();
        let dispatcher = Dispatcher::new();
        dispatcher.register("/first", |_| Ok(Some(vec![OscType::Int(1)])));
        dispatcher.register("/second", |_| Ok(Some(vec![OscType::Int(2)])));

        let bundle = OscBundle::new(vec![
            OscMessage::new("/first", vec![]).into(),
            OscMessage::new("/second", vec![]).into(),
        ]);
        let bytes = codec::encode_bundle(&bundle).unwrap();
        client.send_to(&bytes, server.local_addr().unwrap()).unwrap();

        assert_eq!(pump(&mut server, &dispatcher, 1), 1);
        assert_eq!(recv(&client).address, "/first");
        assert_eq!(recv(&client).address, "/second");
    }

    #[test]
    fn test_malformed_datagram_is_dropped() {
        let client = client();
        let reply_port = client.local_addr().unwrap().port();
        let mut server = OscServer::bind(localhost(0), localhost(reply_port)).unwrap();
        let dispatcher = Dispatcher::new();
        dispatcher.register("/ok", |_| Ok(Some(vec![OscType::Bool(true)])));

        client.send_to(b"garbage!", server.local_addr().unwrap()).unwrap();
        let ok = codec::encode_message("/ok", &[]).unwrap();
        client.send_to(&ok, server.local_addr().unwrap()).unwrap();

        assert_eq!(pump(&mut server, &dispatcher, 2), 2);
        assert_eq!(recv(&client).address, "/ok");
    }

    #[test]
    fn test_shutdown_sends_disconnect_and_closes() {
        let client = client();
        let reply_port = client.local_addr().unwrap().port();
        let server = OscServer::bind(localhost(0), localhost(reply_port)).unwrap();
        let sender = server.sender();

        server.shutdown("/live/connection/disconnected");

        let msg = recv(&client);
        assert_eq!(msg.address, "/live/connection/disconnected");
        assert_eq!(msg.args, vec![OscType::Bool(true)]);
        assert!(sender.is_closed());
        assert!(sender.send("/late", &[]).is_err());
    }

    #[test]
    fn test_oversized_message_rejected() {
        let server = OscServer::bind(localhost(0), localhost(9)).unwrap();
        let blob = OscType::Blob(vec![0u8; MAX_DATAGRAM_SIZE]);
        assert!(matches!(
            server.sender().send("/big", &[blob]),
            Err(Error::Encoding(_))
        ));
    }
}
