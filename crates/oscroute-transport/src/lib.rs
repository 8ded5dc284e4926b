//! oscroute transport layer
//!
//! The boundary between routing and the network:
//! - [`Transport`], the outbound half (`send` one OSC packet)
//! - [`packet_channel`], the inbound handoff: any thread pushes decoded
//!   packets through a [`PacketSender`], the router drains the
//!   [`PacketReceiver`] on its own task
//! - UDP (async task or dedicated OS thread) and in-process loopback
//!   implementations

pub mod channel;
pub mod codec;
pub mod error;
pub mod loopback;
pub mod traits;

#[cfg(feature = "udp")]
pub mod udp;

pub use channel::{packet_channel, InboundPacket, PacketReceiver, PacketSender};
pub use error::{Result, TransportError};
pub use loopback::LoopbackTransport;
pub use traits::Transport;

#[cfg(feature = "udp")]
pub use udp::{spawn_threaded_receiver, ReceiverHandle, UdpConfig, UdpTransport};
