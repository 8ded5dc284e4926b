//! OSC server
//!
//! A [`Server`] owns a [`RouteTable`] and the receiving end of a packet
//! handoff channel. Transports push decoded packets into a
//! [`PacketSender`], from a tokio task or from any OS thread, and
//! [`Server::run`] drains the channel and fans each message out to the
//! matching routes.

use std::net::SocketAddr;
use std::sync::Arc;

use oscroute_core::Descriptor;
use oscroute_transport::{
    packet_channel, LoopbackTransport, PacketReceiver, PacketSender,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[cfg(feature = "udp")]
use oscroute_transport::{spawn_threaded_receiver, ReceiverHandle, UdpConfig, UdpTransport};

use crate::error::{Result, RouterError};
use crate::route::Route;
use crate::table::RouteTable;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the UDP socket (e.g., "0.0.0.0:9000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Largest datagram accepted
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Name used in logs
    #[serde(default = "default_name")]
    pub name: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_max_packet_size() -> usize {
    65507
}

fn default_name() -> String {
    "oscroute".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_packet_size: default_max_packet_size(),
            name: default_name(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        self.bind_addr.parse::<SocketAddr>().map_err(|e| {
            RouterError::Config(format!("invalid bind_addr {:?}: {}", self.bind_addr, e))
        })?;
        if self.max_packet_size == 0 {
            return Err(RouterError::Config(
                "max_packet_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(feature = "udp")]
    pub fn udp_config(&self) -> UdpConfig {
        UdpConfig {
            max_packet_size: self.max_packet_size,
            ..Default::default()
        }
    }
}

/// Receivers feeding the server, stopped on shutdown
#[derive(Default)]
struct Receivers {
    tasks: Vec<JoinHandle<()>>,
    #[cfg(feature = "udp")]
    threads: Vec<ReceiverHandle>,
}

/// Route-serving OSC server
pub struct Server {
    config: ServerConfig,
    table: Arc<RouteTable>,
    sender: PacketSender,
    receiver: Mutex<Option<PacketReceiver>>,
    receivers: Mutex<Receivers>,
    running: RwLock<bool>,
    shutdown: Notify,
}

impl Server {
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let (sender, receiver) = packet_channel();
        Ok(Self {
            config,
            table: Arc::new(RouteTable::new()),
            sender,
            receiver: Mutex::new(Some(receiver)),
            receivers: Mutex::new(Receivers::default()),
            running: RwLock::new(false),
            shutdown: Notify::new(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Serve a route; see [`RouteTable::route`]
    pub fn route(&self, route: Route) -> Result<Route> {
        self.table.route(route)
    }

    /// Serve `path` with arguments described by `typespec`
    pub fn route_path(&self, path: &str, typespec: impl Into<Descriptor>) -> Result<Route> {
        self.route(Route::parse(path, typespec)?)
    }

    pub fn unroute(&self, route: &Route) -> bool {
        self.table.unroute(route)
    }

    /// A handle transports use to hand packets to this server
    pub fn packet_sender(&self) -> PacketSender {
        self.sender.clone()
    }

    /// An in-process transport delivering straight to this server
    pub fn loopback(&self) -> LoopbackTransport {
        LoopbackTransport::new(self.packet_sender())
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Bind the configured address and receive on a tokio task
    #[cfg(feature = "udp")]
    pub async fn bind_udp(&self) -> Result<SocketAddr> {
        let transport =
            UdpTransport::bind_with_config(&self.config.bind_addr, self.config.udp_config())
                .await?;
        let addr = transport.local_addr()?;
        let task = transport.spawn_receiver(self.packet_sender());
        self.receivers.lock().tasks.push(task);
        info!("{} listening on {}", self.config.name, addr);
        Ok(addr)
    }

    /// Bind the configured address and receive on a dedicated thread
    #[cfg(feature = "udp")]
    pub fn bind_udp_threaded(&self) -> Result<SocketAddr> {
        let handle = spawn_threaded_receiver(
            &self.config.bind_addr,
            self.config.udp_config(),
            self.packet_sender(),
        )?;
        let addr = handle.local_addr();
        self.receivers.lock().threads.push(handle);
        info!("{} listening on {} (thread)", self.config.name, addr);
        Ok(addr)
    }

    /// Dispatch incoming packets until [`Server::shutdown`].
    ///
    /// Can be called once; every route is withdrawn when it returns.
    pub async fn run(&self) -> Result<()> {
        let mut receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| RouterError::Config("server is already running".to_string()))?;

        *self.running.write() = true;
        info!("{} started", self.config.name);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                inbound = receiver.recv() => match inbound {
                    Some(inbound) => {
                        let delivered = self.table.dispatch_packet(&inbound.packet);
                        debug!("Packet from {:?} delivered to {} routes", inbound.from, delivered);
                    }
                    None => break,
                },
            }
        }

        *self.running.write() = false;
        receiver.close();
        self.stop_receivers();
        self.table.clear();
        info!("{} stopped", self.config.name);
        Ok(())
    }

    /// Run on a tokio task
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let server = Arc::clone(self);
        tokio::spawn(async move { server.run().await })
    }

    /// Ask [`Server::run`] to return
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    fn stop_receivers(&self) {
        let mut receivers = self.receivers.lock();
        for task in receivers.tasks.drain(..) {
            task.abort();
        }
        #[cfg(feature = "udp")]
        for mut handle in receivers.threads.drain(..) {
            handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = ServerConfig {
            bind_addr: "not an address".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RouterError::Config(_))));

        let config = ServerConfig {
            max_packet_size: 0,
            ..Default::default()
        };
        assert!(matches!(Server::new(config), Err(RouterError::Config(_))));
    }

    #[test]
    fn test_refuses_pattern_route() {
        let server = Server::new(ServerConfig::default()).unwrap();
        assert!(matches!(
            server.route_path("/foo/*", "i"),
            Err(RouterError::Route(_))
        ));
    }

    #[tokio::test]
    async fn test_run_twice() {
        let server = Arc::new(Server::new(ServerConfig::default()).unwrap());
        let handle = server.spawn();
        while !server.is_running() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(server.run().await, Err(RouterError::Config(_))));
        server.shutdown();
        handle.await.unwrap().unwrap();
        assert!(!server.is_running());
    }
}
