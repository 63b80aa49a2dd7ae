//! Loopback gateway plus a client that owns the reply port

use setu_osc::codec::{self, OscMessage, OscPacket};
use setu_osc::{Gateway, GatewayConfig, GatewayHandle, OscType};
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

pub struct Harness {
    pub gateway: Gateway,
    pub handle: GatewayHandle,
    /// Sends requests from an ephemeral port
    requester: UdpSocket,
    /// Bound to the configured reply port
    replies: UdpSocket,
}

impl Harness {
    pub fn new() -> Self {
        let replies = UdpSocket::bind("127.0.0.1:0").unwrap();
        replies
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let mut config = GatewayConfig::default();
        config.network.bind_address = "127.0.0.1".to_string();
        config.network.listen_port = 0;
        config.network.tcp_port = 0;
        config.network.reply_port = replies.local_addr().unwrap().port();
        config.bulk.read_timeout_secs = 2;

        let gateway = Gateway::bind(&config).unwrap();
        let handle = gateway.handle();

        Self {
            gateway,
            handle,
            requester: UdpSocket::bind("127.0.0.1:0").unwrap(),
            replies,
        }
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.gateway.local_udp_addr().unwrap()
    }

    pub fn send_raw(&self, bytes: &[u8]) {
        self.requester.send_to(bytes, self.udp_addr()).unwrap();
    }

    pub fn send(&self, address: &str, args: &[OscType]) {
        self.send_raw(&codec::encode_message(address, args).unwrap());
    }

    /// Run the tick until `expected` datagrams have been handled
    pub fn pump(&mut self, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut handled = 0;
        while handled < expected && Instant::now() < deadline {
            handled += self.gateway.process_pending();
            std::thread::sleep(Duration::from_millis(5));
        }
        handled
    }

    pub fn recv(&self) -> OscMessage {
        self.try_recv(Duration::from_secs(2))
            .expect("no reply within timeout")
    }

    pub fn try_recv(&self, timeout: Duration) -> Option<OscMessage> {
        self.replies.set_read_timeout(Some(timeout)).unwrap();
        let mut buf = [0u8; 4096];
        let len = match self.replies.recv_from(&mut buf) {
            Ok((len, _)) => len,
            Err(_) => return None,
        };
        match codec::decode(&buf[..len]).unwrap() {
            OscPacket::Message(msg) => Some(msg),
            other => panic!("expected message, got {:?}", other),
        }
    }

    /// Shut the gateway down and return the disconnect notification
    pub fn shutdown(self) -> OscMessage {
        let Harness {
            gateway, replies, ..
        } = self;
        gateway.shutdown();

        let mut buf = [0u8; 512];
        let (len, _) = replies.recv_from(&mut buf).unwrap();
        codec::decode(&buf[..len])
            .unwrap()
            .into_messages()
            .remove(0)
    }
}
