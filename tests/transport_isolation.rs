//! Failure isolation tests for the stream transport
//!
//! A failure on one connection must never disturb another, a failed accept
//! must never stop the acceptor, and a failing handler must only lose the
//! packet it was given.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::time::Duration;

use common::{wait_for, Harness};
use futures::{SinkExt, StreamExt};
use mal_transport::core::Packet;
use tokio::io::AsyncWriteExt;

fn packet(payload: &[u8]) -> Packet {
    Packet::new(payload.to_vec())
}

#[tokio::test]
async fn test_failure_on_one_connection_leaves_others_running() {
    let harness = Harness::start(2);
    let mut a = harness.connect();
    let mut b = harness.connect();
    let mut c = harness.connect();

    a.send(packet(b"uri:A")).await.unwrap();
    b.send(packet(b"uri:B")).await.unwrap();
    c.send(packet(b"uri:C")).await.unwrap();
    wait_for("identification", || harness.recorder.packet_count() == 3).await;

    // peer A goes away mid-session
    drop(a);
    wait_for("report for A", || harness.recorder.reported() == vec!["A"]).await;

    b.send(packet(b"still here")).await.unwrap();
    c.send(packet(b"me too")).await.unwrap();
    wait_for("traffic on B and C", || harness.recorder.packet_count() == 5).await;

    assert_eq!(harness.recorder.reported(), vec!["A".to_string()]);
    assert_eq!(
        harness.recorder.payloads_for(2),
        vec![b"uri:B".to_vec(), b"still here".to_vec()]
    );
    assert_eq!(
        harness.recorder.payloads_for(3),
        vec![b"uri:C".to_vec(), b"me too".to_vec()]
    );

    drop(b);
    drop(c);
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_unidentified_peer_is_closed_without_report() {
    let harness = Harness::start(1);
    let mut peer = harness.connect();

    // unsupported framing version
    peer.get_mut().write_all(&[0x09, 0, 0, 0, 0]).await.unwrap();

    let next = tokio::time::timeout(Duration::from_secs(5), peer.next())
        .await
        .expect("server should close the connection");
    assert!(next.is_none());
    assert!(harness.recorder.reported().is_empty());

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_packet_from_identified_peer_is_reported() {
    let harness = Harness::start(1);
    let mut peer = harness.connect();
    peer.send(packet(b"uri:ground-station")).await.unwrap();
    wait_for("identification", || harness.recorder.packet_count() == 1).await;

    peer.get_mut().write_all(&[0x09, 0, 0, 0, 0]).await.unwrap();
    wait_for("report", || {
        harness.recorder.reported() == vec!["ground-station"]
    })
    .await;

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_accept_failure_does_not_stop_acceptor() {
    let harness = Harness::start(1);
    harness.fail_next_accept();
    harness.fail_next_accept();

    let mut peer = harness.connect();
    peer.send(packet(b"hello")).await.unwrap();
    wait_for("packet after failed accepts", || {
        harness.recorder.packet_count() == 1
    })
    .await;

    drop(peer);
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_handler_failure_loses_only_that_packet() {
    let harness = Harness::start(1);
    let mut peer = harness.connect();

    peer.send(packet(b"first")).await.unwrap();
    peer.send(packet(b"fail")).await.unwrap();
    peer.send(packet(b"panic")).await.unwrap();
    peer.send(packet(b"last")).await.unwrap();

    wait_for("surviving packets", || harness.recorder.packet_count() == 2).await;
    assert_eq!(
        harness.recorder.payloads_for(1),
        vec![b"first".to_vec(), b"last".to_vec()]
    );
    assert!(harness.recorder.reported().is_empty());

    drop(peer);
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_lingering_connections() {
    let harness = Harness::start(1);
    let mut peer = harness.connect();
    peer.send(packet(b"uri:lingering")).await.unwrap();
    wait_for("identification", || harness.recorder.packet_count() == 1).await;

    let recorder = harness.recorder.clone();
    tokio::time::timeout(Duration::from_secs(5), harness.stop())
        .await
        .expect("server should stop after the drain timeout")
        .unwrap();

    let next = tokio::time::timeout(Duration::from_secs(5), peer.next())
        .await
        .expect("connection should be closed");
    assert!(next.is_none());
    wait_for("report", || recorder.reported() == vec!["lingering"]).await;
}

#[tokio::test]
async fn test_server_returns_after_queued_packets_are_handled() {
    let harness = Harness::start(1);
    let mut peer = harness.connect();
    for _ in 0..10 {
        peer.send(packet(b"slow")).await.unwrap();
    }
    wait_for("first slow packet", || harness.recorder.packet_count() >= 1).await;
    drop(peer);

    let recorder = harness.recorder.clone();
    harness.stop().await.unwrap();

    assert_eq!(recorder.packet_count(), 10);
    assert!(recorder.reported().is_empty());
}

#[tokio::test]
async fn test_tcp_listener_end_to_end() {
    use std::sync::Arc;

    use mal_transport::config::TransportConfig;
    use mal_transport::core::{AttributeDecoder, AttributeEncoder, PacketCodec};
    use mal_transport::transport::server::start_server_with_shutdown;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio_util::codec::Framed;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = TransportConfig::default_with_overrides(|c| {
        c.server.shutdown_timeout = Duration::from_secs(1);
        c.codec.short_length_field = true;
    });
    let profile = config.wire_profile();

    let recorder = Arc::new(common::Recorder::default());
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let server = tokio::spawn(start_server_with_shutdown(
        listener,
        config,
        recorder.clone(),
        recorder.clone(),
        shutdown_rx,
    ));

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = Framed::new(stream, PacketCodec::default());

    let mut encoder = AttributeEncoder::new(profile);
    encoder.encode_nullable_string(Some("over tcp")).unwrap();
    encoder.encode_ulong(7u64).unwrap();
    client.send(Packet::new(encoder.into_bytes())).await.unwrap();

    wait_for("tcp packet", || recorder.packet_count() == 1).await;
    let (_, payload) = recorder.packets().remove(0);
    let mut decoder = AttributeDecoder::from_slice(&payload, profile);
    assert_eq!(
        decoder.decode_nullable_string().unwrap().as_deref(),
        Some("over tcp")
    );
    assert_eq!(decoder.decode_ulong().unwrap(), 7);

    drop(client);
    shutdown_tx.send(()).await.unwrap();
    server.await.unwrap().unwrap();
}
