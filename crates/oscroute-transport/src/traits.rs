//! Transport trait definitions

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use rosc::OscPacket;

use crate::error::Result;

/// Outbound half of a transport: hands one packet to the wire
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one packet to the transport's target
    async fn send(&self, packet: OscPacket) -> Result<()>;

    /// Get the local address (if applicable)
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, packet: OscPacket) -> Result<()> {
        (**self).send(packet).await
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        (**self).local_addr()
    }
}
