//! UDP receive paths feeding the inbound handoff

use std::time::Duration;

use oscroute_test_utils::{init_tracing, TEST_TIMEOUT};
use oscroute_transport::{
    packet_channel, spawn_threaded_receiver, Transport, UdpConfig, UdpTransport,
};
use rosc::{OscMessage, OscPacket, OscType};
use tokio::time::timeout;

fn message(addr: &str, value: i32) -> OscPacket {
    OscPacket::Message(OscMessage {
        addr: addr.to_string(),
        args: vec![OscType::Int(value)],
    })
}

#[tokio::test]
async fn test_async_receiver_hands_off_packets() {
    init_tracing();
    let (tx, mut rx) = packet_channel();

    let server = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let task = server.spawn_receiver(tx);
    let server_addr = server.local_addr().unwrap();

    let client = UdpTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_target(server_addr);
    let client_addr = client.local_addr().unwrap();

    for i in 0..3 {
        client.send(message("/count", i)).await.unwrap();
    }

    for i in 0..3 {
        let inbound = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(inbound.packet, message("/count", i));
        assert_eq!(inbound.from, Some(client_addr));
    }

    task.abort();
}

#[tokio::test]
async fn test_threaded_receiver_hands_off_packets() {
    init_tracing();
    let (tx, mut rx) = packet_channel();

    let config = UdpConfig {
        read_timeout_ms: 10,
        ..Default::default()
    };
    let mut handle = spawn_threaded_receiver("127.0.0.1:0", config, tx).unwrap();
    assert!(handle.is_running());

    let client = UdpTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_target(handle.local_addr());
    client.send(message("/thread", 7)).await.unwrap();

    let inbound = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(inbound.packet, message("/thread", 7));

    handle.stop();
    assert!(!handle.is_running());
}

#[tokio::test]
async fn test_threaded_receiver_skips_garbage() {
    init_tracing();
    let (tx, mut rx) = packet_channel();
    let handle = spawn_threaded_receiver("127.0.0.1:0", UdpConfig::default(), tx).unwrap();
    let target = handle.local_addr();

    let raw = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    raw.send_to(b"not osc", target).unwrap();

    let client = UdpTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_target(target);
    client.send(message("/ok", 1)).await.unwrap();

    let inbound = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(inbound.packet, message("/ok", 1));
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
}

#[tokio::test]
async fn test_bind_failure() {
    let result = UdpTransport::bind("not-an-address").await;
    assert!(result.is_err());
}
