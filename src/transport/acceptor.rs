//! Accept loop.
//!
//! Each accepted stream becomes a [`Connection`] with its own receiver task,
//! tracked so shutdown can wait for every receiver to finish. A failed accept
//! is logged and counted, and the loop carries on.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::core::PacketCodec;
use crate::error::ProtocolError;
use crate::transport::connection::Connection;
use crate::transport::receiver::ConnectionReceiver;
use crate::transport::TransportContext;

/// Source of incoming streams.
pub trait Listener: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Listener for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

pub struct ConnectionAcceptor<L> {
    listener: L,
    context: Arc<TransportContext>,
    connections: CancellationToken,
    receivers: TaskTracker,
    next_id: u64,
}

impl<L: Listener> ConnectionAcceptor<L> {
    pub fn new(listener: L, context: Arc<TransportContext>) -> Self {
        Self {
            listener,
            context,
            connections: CancellationToken::new(),
            receivers: TaskTracker::new(),
            next_id: 0,
        }
    }

    /// Parent token of every connection accepted here; cancelling it fails
    /// all pending reads.
    pub fn connections_token(&self) -> CancellationToken {
        self.connections.clone()
    }

    /// Tracker of the receiver tasks spawned here.
    pub fn receivers(&self) -> TaskTracker {
        self.receivers.clone()
    }

    /// Accept until `shutdown_rx` fires or its sender is dropped.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!("Accepting connections");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Acceptor stopping");
                    return;
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            self.spawn_connection(stream, peer);
                        }
                        Err(e) => {
                            let error = ProtocolError::Accept(e);
                            warn!(error = %error, "Error accepting connection");
                            self.context.metrics.accept_error();
                        }
                    }
                }
            }
        }
    }

    fn spawn_connection(&mut self, stream: L::Stream, peer: SocketAddr) {
        self.next_id += 1;
        let (reader, writer) = tokio::io::split(stream);
        let connection = Arc::new(Connection::new(
            self.next_id,
            peer,
            writer,
            PacketCodec::new(self.context.max_packet_size),
            self.connections.child_token(),
        ));

        info!(connection = self.next_id, peer = %peer, "New connection established");
        self.context.metrics.connection_established();

        let mut receiver = ConnectionReceiver::new(connection, reader, self.context.clone());
        let metrics = self.context.metrics.clone();
        self.receivers.spawn(async move {
            let exit = receiver.run().await;
            metrics.connection_closed();
            debug!(connection = receiver.connection().id(), ?exit, "Receiver finished");
        });
    }
}
