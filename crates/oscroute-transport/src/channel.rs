//! Inbound packet handoff
//!
//! Receivers run wherever they like (a tokio task, a blocking OS thread)
//! and hand decoded packets to the routing task through an unbounded MPSC
//! channel. Only the routing task touches subscriber inboxes.

use std::net::SocketAddr;

use rosc::OscPacket;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};

/// A decoded packet and its source, if it came from the network
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPacket {
    pub packet: OscPacket,
    pub from: Option<SocketAddr>,
}

/// Producer half of the handoff. Cheap to clone, `Send`, and never blocks,
/// so it can be used from any OS thread.
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<InboundPacket>,
}

/// Consumer half of the handoff
#[derive(Debug)]
pub struct PacketReceiver {
    rx: mpsc::UnboundedReceiver<InboundPacket>,
}

pub fn packet_channel() -> (PacketSender, PacketReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PacketSender { tx }, PacketReceiver { rx })
}

impl PacketSender {
    pub fn send(&self, packet: OscPacket, from: Option<SocketAddr>) -> Result<()> {
        self.tx
            .send(InboundPacket { packet, from })
            .map_err(|_| TransportError::Closed)
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PacketReceiver {
    /// Wait for the next packet; `None` once every sender is dropped or the
    /// receiver is closed and drained
    pub async fn recv(&mut self) -> Option<InboundPacket> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InboundPacket> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting packets; already queued packets can still be drained
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::OscMessage;

    fn packet(addr: &str) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args: vec![],
        })
    }

    #[tokio::test]
    async fn test_handoff_from_os_thread() {
        let (tx, mut rx) = packet_channel();
        let handle = std::thread::spawn(move || {
            for addr in ["/a", "/b"] {
                tx.send(packet(addr), None).unwrap();
            }
        });
        handle.join().unwrap();

        assert_eq!(rx.recv().await.unwrap().packet, packet("/a"));
        assert_eq!(rx.recv().await.unwrap().packet, packet("/b"));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_send_after_close() {
        let (tx, mut rx) = packet_channel();
        rx.close();
        assert!(tx.is_closed());
        assert!(matches!(tx.send(packet("/a"), None), Err(TransportError::Closed)));
    }
}
