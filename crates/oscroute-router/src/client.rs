//! OSC client
//!
//! [`Client`] validates values against a route's typespec and sends the
//! packed message over any [`Transport`]. Nothing reaches the transport
//! unless every argument converts.

use std::net::SocketAddr;

use oscroute_core::{TimeTag, Value};
use oscroute_transport::Transport;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "udp")]
use oscroute_transport::UdpTransport;

use crate::error::{Result, RouterError};
use crate::message::{Bundle, BundleItem, Message};
use crate::route::Route;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server address messages are sent to
    #[serde(default = "default_target_addr")]
    pub target_addr: String,
}

fn default_target_addr() -> String {
    "127.0.0.1:9000".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target_addr: default_target_addr(),
        }
    }
}

impl ClientConfig {
    pub fn target(&self) -> Result<SocketAddr> {
        self.target_addr.parse().map_err(|e| {
            RouterError::Config(format!("invalid target_addr {:?}: {}", self.target_addr, e))
        })
    }
}

/// Sends messages to routes over a transport
pub struct Client<T: Transport> {
    transport: T,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validate `values` for `route` and send them.
    ///
    /// A pattern route is sent once to its pattern; a union route once per
    /// member path. Returns the number of packets sent.
    pub async fn send(&self, route: &Route, values: &[Value]) -> Result<usize> {
        if route.matches_any_path() {
            return Err(RouterError::Send(format!("cannot send to {}", route)));
        }
        let message = Message::new(route.clone(), values)?;
        self.send_message(&message).await
    }

    pub async fn send_message(&self, message: &Message) -> Result<usize> {
        let packets = message.to_packets()?;
        let count = packets.len();
        for packet in packets {
            self.transport.send(packet).await?;
        }
        debug!("Sent {} to {} addresses", message.route(), count);
        Ok(count)
    }

    /// Send messages and nested bundles as one bundle
    pub async fn bundle<I, B>(&self, items: I, timetag: TimeTag) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: Into<BundleItem>,
    {
        self.send_bundle(&Bundle::with_items(items, timetag)).await
    }

    pub async fn send_bundle(&self, bundle: &Bundle) -> Result<()> {
        let packet = bundle.to_packet()?;
        self.transport.send(packet).await?;
        debug!("Sent bundle of {} items at {}", bundle.len(), bundle.timetag());
        Ok(())
    }
}

#[cfg(feature = "udp")]
impl Client<UdpTransport> {
    /// Bind an ephemeral UDP socket aimed at `config.target_addr`
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let target = config.target()?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let transport = UdpTransport::bind(local).await?.with_target(target);
        Ok(Self::new(transport))
    }
}
