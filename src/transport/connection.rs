//! Shared handle for one accepted stream.
//!
//! The receiver task owns the read half exclusively. Everything else a
//! connection carries lives here, behind an `Arc`, so the dispatch path can
//! publish the peer's URI and send replies while the receiver is reading.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, trace};

use crate::core::{Packet, PacketCodec};
use crate::error::{ProtocolError, Result};

pub type ConnectionHandle = Arc<Connection>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Lifecycle of a connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

pub struct Connection {
    id: u64,
    peer_addr: SocketAddr,
    remote_uri: OnceLock<String>,
    state: AtomicU8,
    writer: Mutex<Option<FramedWrite<BoxedWriter, PacketCodec>>>,
    cancel: CancellationToken,
}

impl Connection {
    pub fn new<W>(
        id: u64,
        peer_addr: SocketAddr,
        writer: W,
        codec: PacketCodec,
        cancel: CancellationToken,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: BoxedWriter = Box::new(writer);
        Self {
            id,
            peer_addr,
            remote_uri: OnceLock::new(),
            state: AtomicU8::new(ConnectionState::Open as u8),
            writer: Mutex::new(Some(FramedWrite::new(writer, codec))),
            cancel,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Publish the peer's URI once it has been learned from a message.
    ///
    /// Returns `false` if a URI was already published; the first one wins.
    pub fn set_remote_uri(&self, uri: impl Into<String>) -> bool {
        let published = self.remote_uri.set(uri.into()).is_ok();
        if published {
            trace!(connection = self.id, "Remote URI published");
        }
        published
    }

    pub fn remote_uri(&self) -> Option<&str> {
        self.remote_uri.get().map(String::as_str)
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Wrap `payload` in a packet and write it to the peer.
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.send_packet(Packet::new(payload)).await
    }

    pub async fn send_packet(&self, packet: Packet) -> Result<()> {
        if !self.is_open() {
            return Err(ProtocolError::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(framed) => framed.send(packet).await,
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Close the connection locally.
    ///
    /// Cancels the receiver's pending read and shuts the write half down.
    /// Calling it again is a no-op.
    pub async fn close(&self) {
        let previous = self.state.compare_exchange(
            ConnectionState::Open as u8,
            ConnectionState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if previous.is_err() {
            return;
        }

        debug!(connection = self.id, peer = %self.peer_addr, "Closing connection");
        self.cancel.cancel();

        if let Some(mut framed) = self.writer.lock().await.take() {
            if let Err(e) = framed.get_mut().shutdown().await {
                trace!(connection = self.id, error = %e, "Write half shutdown failed");
            }
        }
    }

    /// Resolves once the connection has been closed or its server shut down.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub(crate) fn mark_closed(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("remote_uri", &self.remote_uri())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn connection(writer: tokio::io::DuplexStream) -> Connection {
        Connection::new(
            7,
            "127.0.0.1:4000".parse().unwrap(),
            writer,
            PacketCodec::default(),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_remote_uri_published_once() {
        let (_peer, local) = tokio::io::duplex(64);
        let conn = connection(local);
        assert_eq!(conn.remote_uri(), None);
        assert!(conn.set_remote_uri("malspp:42"));
        assert!(!conn.set_remote_uri("malspp:43"));
        assert_eq!(conn.remote_uri(), Some("malspp:42"));
    }

    #[tokio::test]
    async fn test_send_frames_payload() {
        let (peer, local) = tokio::io::duplex(64);
        let conn = connection(local);
        conn.send(vec![1u8, 2, 3]).await.unwrap();

        let mut frames = FramedRead::new(peer, PacketCodec::default());
        let packet = frames.next().await.unwrap().unwrap();
        assert_eq!(&packet.payload[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_close_cancels_and_rejects_sends() {
        let (_peer, local) = tokio::io::duplex(64);
        let conn = connection(local);
        conn.close().await;

        assert_eq!(conn.state(), ConnectionState::Closing);
        conn.cancelled().await;
        assert!(matches!(
            conn.send(vec![0u8]).await,
            Err(ProtocolError::ConnectionClosed)
        ));

        conn.close().await;
        conn.mark_closed();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
