//! In-process loopback transport
//!
//! Sent packets are encoded and decoded exactly as a network transport
//! would, then handed straight to a [`PacketSender`]. Useful for wiring a
//! client to a server in the same process.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rosc::OscPacket;
use tracing::debug;

use crate::channel::PacketSender;
use crate::codec;
use crate::error::{Result, TransportError};
use crate::traits::Transport;

#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    sink: Arc<Mutex<Option<PacketSender>>>,
}

impl LoopbackTransport {
    pub fn new(sink: PacketSender) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Some(sink))),
        }
    }

    /// Drop the handoff sender; later sends fail with `Closed`
    pub fn close(&self) {
        self.sink.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        match &*self.sink.lock() {
            Some(sink) => sink.is_closed(),
            None => true,
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, packet: OscPacket) -> Result<()> {
        let bytes = codec::encode(&packet)?;
        let packet = codec::decode(&bytes)?;
        debug!("loopback carrying {} bytes", bytes.len());

        let sink = self.sink.lock().clone().ok_or(TransportError::Closed)?;
        sink.send(packet, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::packet_channel;
    use rosc::{OscMessage, OscType};

    #[tokio::test]
    async fn test_loopback_delivers() {
        let (tx, mut rx) = packet_channel();
        let transport = LoopbackTransport::new(tx);
        let packet = OscPacket::Message(OscMessage {
            addr: "/foo".to_string(),
            args: vec![OscType::Float(0.5)],
        });

        transport.send(packet.clone()).await.unwrap();
        let inbound = rx.recv().await.unwrap();
        assert_eq!(inbound.packet, packet);
        assert_eq!(inbound.from, None);
    }

    #[tokio::test]
    async fn test_loopback_closed() {
        let (tx, _rx) = packet_channel();
        let transport = LoopbackTransport::new(tx);
        transport.close();
        assert!(transport.is_closed());

        let packet = OscPacket::Message(OscMessage {
            addr: "/foo".to_string(),
            args: vec![],
        });
        assert!(matches!(
            transport.send(packet).await,
            Err(TransportError::Closed)
        ));
    }
}
