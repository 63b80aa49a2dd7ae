//! Gateway runtime and registration API
//!
//! [`Gateway`] owns both listeners and is driven by the host's tick:
//!
//! ```text
//! host tick ──► Gateway::process_pending ──► OscServer (drain UDP)
//!                                               │
//!                                               ▼
//!                                           Dispatcher ──► handlers
//!
//! accept thread ──► BulkServer ──► worker per connection ──► BulkRegistry
//! ```
//!
//! Domain code never touches the sockets. It registers through a cloneable
//! [`GatewayHandle`], which is also what handlers capture when they need to
//! send, subscribe, or re-register.

use crate::codec::OscType;
use crate::config::GatewayConfig;
use crate::dispatch::{Dispatcher, HandlerError, HandlerResult};
use crate::error::Result;
use crate::host::HostObject;
use crate::listen::{ListenGetter, SubscriptionRegistry};
use crate::transport::{BulkPayload, BulkRegistry, BulkServer, OscSender, OscServer};
use std::net::SocketAddr;
use std::sync::Arc;

/// Cloneable registration and send API
#[derive(Clone)]
pub struct GatewayHandle {
    dispatcher: Dispatcher,
    bulk: BulkRegistry,
    sender: OscSender,
    listeners: Arc<SubscriptionRegistry>,
    prefix: String,
}

impl GatewayHandle {
    fn new(sender: OscSender, bulk: BulkRegistry, prefix: &str) -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            bulk,
            listeners: Arc::new(SubscriptionRegistry::new(sender.clone(), prefix)),
            sender,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Address prefix, without trailing slash
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register a UDP address handler (last registration wins)
    pub fn add_handler<F>(&self, address: &str, handler: F)
    where
        F: Fn(&[OscType]) -> HandlerResult + Send + Sync + 'static,
    {
        self.dispatcher.register(address, handler);
    }

    /// Register a TCP bulk handler for a command token
    pub fn add_tcp_handler<F>(&self, token: &str, handler: F)
    where
        F: Fn() -> std::result::Result<BulkPayload, HandlerError> + Send + Sync + 'static,
    {
        self.bulk.register(token, handler);
    }

    /// Send to the current reply target
    pub fn send(&self, address: &str, args: &[OscType]) -> Result<()> {
        self.sender.send(address, args)
    }

    /// Send to an explicit destination
    pub fn send_to(&self, address: &str, args: &[OscType], dest: SocketAddr) -> Result<()> {
        self.sender.send_to(address, args, dest)
    }

    pub fn reply_target(&self) -> SocketAddr {
        self.sender.reply_target()
    }

    /// See [`SubscriptionRegistry::start_listen`]
    pub fn start_listen(
        &self,
        component: &str,
        target: Arc<dyn HostObject>,
        property: &str,
        params: &[OscType],
        getter: Option<ListenGetter>,
    ) -> std::result::Result<(), HandlerError> {
        self.listeners
            .start_listen(component, target, property, params, getter)
    }

    pub fn stop_listen(&self, component: &str, property: &str, params: &[OscType]) {
        self.listeners.stop_listen(component, property, params);
    }

    pub fn clear_listeners(&self) {
        self.listeners.clear_all();
    }

    /// Remove every UDP and TCP handler
    pub fn clear_handlers(&self) {
        self.dispatcher.unregister_all();
        self.bulk.clear();
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn listeners(&self) -> &SubscriptionRegistry {
        &self.listeners
    }

    pub fn bulk_registry(&self) -> &BulkRegistry {
        &self.bulk
    }
}

/// Both listeners plus the shared tables
pub struct Gateway {
    server: OscServer,
    bulk_server: BulkServer,
    handle: GatewayHandle,
    disconnect_address: String,
}

impl Gateway {
    /// Bind the UDP and TCP listeners described by `config`
    pub fn bind(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let server = OscServer::bind(config.udp_listen_addr()?, config.default_reply_addr()?)?;
        let bulk = BulkRegistry::new();
        let bulk_server =
            BulkServer::start(config.tcp_listen_addr()?, bulk.clone(), config.bulk_limits())?;
        let handle = GatewayHandle::new(server.sender(), bulk, config.prefix());

        Ok(Self {
            server,
            bulk_server,
            handle,
            disconnect_address: config.disconnect_address(),
        })
    }

    pub fn handle(&self) -> GatewayHandle {
        self.handle.clone()
    }

    /// Drain and dispatch all queued datagrams; never blocks
    pub fn process_pending(&mut self) -> usize {
        self.server.process_pending(&self.handle.dispatcher)
    }

    pub fn local_udp_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    pub fn bulk_addr(&self) -> SocketAddr {
        self.bulk_server.local_addr()
    }

    /// Drop every subscription and handler, e.g. before re-registering on reload
    pub fn reset(&self) {
        log::info!("Resetting gateway handlers and listeners");
        self.handle.clear_listeners();
        self.handle.clear_handlers();
    }

    /// Notify the client, then close both listeners
    ///
    /// Handlers often capture a [`GatewayHandle`], which shares the tables
    /// they live in; clearing them here releases those references.
    pub fn shutdown(mut self) {
        self.handle.clear_listeners();
        self.handle.clear_handlers();
        self.bulk_server.shutdown();
        self.server.shutdown(&self.disconnect_address);
    }
}
