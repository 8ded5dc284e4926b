//! UDP transport implementation
//!
//! Two receive paths feed the same handoff channel:
//! [`UdpTransport::spawn_receiver`] runs on the tokio runtime, while
//! [`spawn_threaded_receiver`] polls a blocking socket on a dedicated OS
//! thread for hosts that keep network I/O off the scheduler.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use rosc::OscPacket;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::channel::PacketSender;
use crate::codec;
use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// UDP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpConfig {
    /// Socket receive buffer size
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
    /// Largest datagram accepted
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Poll interval of the threaded receiver, in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_recv_buffer_size() -> usize {
    65536
}

fn default_max_packet_size() -> usize {
    65507 // Max UDP payload
}

fn default_read_timeout_ms() -> u64 {
    100
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: default_recv_buffer_size(),
            max_packet_size: default_max_packet_size(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Resolve and bind a UDP socket with the configured receive buffer
fn bind_std(addr: &str, config: &UdpConfig) -> Result<std::net::UdpSocket> {
    let resolved = addr
        .to_socket_addrs()
        .map_err(|e| TransportError::Bind(format!("{}: {}", addr, e)))?
        .next()
        .ok_or_else(|| TransportError::Bind(format!("{}: no address", addr)))?;

    let socket = Socket::new(Domain::for_address(resolved), Type::DGRAM, Some(Protocol::UDP))?;
    if let Err(e) = socket.set_recv_buffer_size(config.recv_buffer_size) {
        warn!("could not set UDP receive buffer to {}: {}", config.recv_buffer_size, e);
    }
    socket
        .bind(&resolved.into())
        .map_err(|e| TransportError::Bind(format!("{}: {}", addr, e)))?;
    Ok(socket.into())
}

/// UDP transport (connectionless)
///
/// Sends go to the configured target address; receiving is started
/// separately with [`UdpTransport::spawn_receiver`].
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    target: Option<SocketAddr>,
    config: UdpConfig,
}

impl UdpTransport {
    /// Bind to a local address
    pub async fn bind(addr: &str) -> Result<Self> {
        Self::bind_with_config(addr, UdpConfig::default()).await
    }

    /// Bind with config
    pub async fn bind_with_config(addr: &str, config: UdpConfig) -> Result<Self> {
        let socket = bind_std(addr, &config)?;
        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket)?;

        info!("UDP bound to {}", socket.local_addr()?);

        Ok(Self {
            socket: Arc::new(socket),
            target: None,
            config,
        })
    }

    /// Set the address [`Transport::send`] delivers to
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = Some(target);
        self
    }

    pub fn target(&self) -> Option<SocketAddr> {
        self.target
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    /// Get local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(TransportError::Io)
    }

    /// Send to a specific address
    pub async fn send_to(&self, packet: &OscPacket, target: SocketAddr) -> Result<()> {
        let bytes = codec::encode(packet)?;
        if bytes.len() > self.config.max_packet_size {
            return Err(TransportError::Send(format!(
                "packet of {} bytes exceeds max_packet_size {}",
                bytes.len(),
                self.config.max_packet_size
            )));
        }
        self.socket
            .send_to(&bytes, target)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        debug!("UDP sent {} bytes to {}", bytes.len(), target);
        Ok(())
    }

    /// Start receiving packets on a tokio task.
    ///
    /// The task ends at the first datagram after the handoff receiver is
    /// dropped; abort the returned handle to stop it sooner.
    pub fn spawn_receiver(&self, sink: PacketSender) -> tokio::task::JoinHandle<()> {
        let socket = self.socket.clone();
        let max_size = self.config.max_packet_size;

        tokio::spawn(async move {
            let mut buf = vec![0u8; max_size];

            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, from)) => {
                        debug!("UDP received {} bytes from {}", len, from);
                        match codec::decode(&buf[..len]) {
                            Ok(packet) => {
                                if sink.send(packet, Some(from)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("OSC decode error from {}: {}", from, e),
                        }
                    }
                    Err(e) => {
                        error!("UDP receive error: {}", e);
                        if sink.is_closed() {
                            break;
                        }
                    }
                }
            }
            debug!("UDP receiver task stopped");
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, packet: OscPacket) -> Result<()> {
        let target = self
            .target
            .ok_or_else(|| TransportError::Send("no target address".to_string()))?;
        self.send_to(&packet, target).await
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

/// Handle to a receiver thread started by [`spawn_threaded_receiver`].
///
/// Dropping the handle stops the thread.
pub struct ReceiverHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReceiverHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("UDP receiver thread panicked");
            }
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Bind a blocking UDP socket and receive on a dedicated OS thread,
/// handing decoded packets off through `sink`.
pub fn spawn_threaded_receiver(
    addr: &str,
    config: UdpConfig,
    sink: PacketSender,
) -> Result<ReceiverHandle> {
    let socket = bind_std(addr, &config)?;
    socket.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms.max(1))))?;
    let local_addr = socket.local_addr()?;
    info!("UDP receiver thread bound to {}", local_addr);

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();

    let thread = thread::Builder::new()
        .name(format!("oscroute-udp-{}", local_addr.port()))
        .spawn(move || {
            let mut buf = vec![0u8; config.max_packet_size];
            while flag.load(Ordering::SeqCst) {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => match codec::decode(&buf[..len]) {
                        Ok(packet) => {
                            if sink.send(packet, Some(from)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("OSC decode error from {}: {}", from, e),
                    },
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                    Err(e) => error!("UDP receive error: {}", e),
                }
            }
            flag.store(false, Ordering::SeqCst);
            info!("UDP receiver thread stopped");
        })?;

    Ok(ReceiverHandle {
        local_addr,
        running,
        thread: Some(thread),
    })
}
