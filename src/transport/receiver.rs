//! Per-connection read loop.
//!
//! A receiver reads complete packets off one connection and submits each to
//! the dispatch pool without waiting for it to be processed. Any read failure
//! ends the loop. The failure is then either reported to the messaging layer
//! for the peer's URI, or, for a peer that never identified itself, the
//! connection is closed quietly. Either way no other connection is affected.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, instrument, trace, warn};

use crate::core::PacketCodec;
use crate::error::ProtocolError;
use crate::transport::connection::ConnectionHandle;
use crate::transport::dispatch::IncomingPacket;
use crate::transport::TransportContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for the next packet
    Listening,
    /// Handing a packet to the dispatch pool
    Delivering,
    Closed,
}

/// How a receiver's loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverExit {
    /// A communication error was reported for this peer URI.
    Reported(String),
    /// The peer never published a URI; the connection was closed locally.
    ClosedUnidentified,
    /// The dispatch pool stopped accepting packets.
    DispatchClosed,
}

pub struct ConnectionReceiver<R> {
    connection: ConnectionHandle,
    frames: FramedRead<R, PacketCodec>,
    context: Arc<TransportContext>,
    state: ReceiverState,
}

impl<R: AsyncRead + Unpin> ConnectionReceiver<R> {
    pub fn new(connection: ConnectionHandle, reader: R, context: Arc<TransportContext>) -> Self {
        let codec = PacketCodec::new(context.max_packet_size);
        Self {
            connection,
            frames: FramedRead::new(reader, codec),
            context,
            state: ReceiverState::Listening,
        }
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Read and submit packets until the connection fails or is closed.
    #[instrument(
        skip(self),
        fields(connection = self.connection.id(), peer = %self.connection.peer_addr())
    )]
    pub async fn run(&mut self) -> ReceiverExit {
        let failure = loop {
            self.state = ReceiverState::Listening;

            let next = tokio::select! {
                _ = self.connection.cancelled() => break ProtocolError::ConnectionClosed,
                next = self.frames.next() => next,
            };

            let packet = match next {
                Some(Ok(packet)) => packet,
                Some(Err(e)) => break e,
                None => break ProtocolError::ConnectionClosed,
            };

            self.state = ReceiverState::Delivering;
            trace!(bytes = packet.payload.len(), "Packet received");
            self.context
                .metrics
                .packet_received(packet.payload.len() as u64);

            let incoming = IncomingPacket {
                connection: self.connection.clone(),
                packet,
            };
            // a full queue must not outlive a close of this connection
            let submitted = tokio::select! {
                _ = self.connection.cancelled() => break ProtocolError::ConnectionClosed,
                submitted = self.context.dispatch.submit(incoming) => submitted,
            };
            if submitted.is_err() {
                warn!("Dispatch pool closed, dropping connection");
                self.connection.close().await;
                self.finish();
                return ReceiverExit::DispatchClosed;
            }
        };

        self.fail(failure).await
    }

    async fn fail(&mut self, error: ProtocolError) -> ReceiverExit {
        if !matches!(error, ProtocolError::ConnectionClosed) {
            self.context.metrics.connection_error();
        }

        let exit = match self.connection.remote_uri() {
            Some(uri) => {
                warn!(remote_uri = %uri, error = %error, "Communication error on connection");
                self.context.metrics.communication_error();
                self.context.events.communication_error(uri);
                ReceiverExit::Reported(uri.to_owned())
            }
            None => {
                debug!(error = %error, "Closing unidentified connection");
                ReceiverExit::ClosedUnidentified
            }
        };

        self.connection.close().await;
        self.finish();
        exit
    }

    fn finish(&mut self) {
        self.state = ReceiverState::Closed;
        self.connection.mark_closed();
    }
}
