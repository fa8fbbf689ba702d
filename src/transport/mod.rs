//! # Stream Transport
//!
//! Connection handling for MAL messages carried over stream sockets.
//!
//! ## Components
//! - **ConnectionAcceptor**: accept loop, one receiver task per connection
//! - **ConnectionReceiver**: reads packets off one connection
//! - **DispatchPool**: hands packets to the messaging layer off the read path
//! - **Server**: entry points with ctrl-c handling and graceful drain
//!
//! ## Failure isolation
//! A read failure ends only the receiver it happened on, an accept failure
//! is logged and skipped, and a failing packet handler affects only the
//! packet it was given.

use std::sync::Arc;

use crate::config::TransportConfig;
use crate::utils::metrics::Metrics;

pub mod acceptor;
pub mod connection;
pub mod dispatch;
pub mod receiver;
pub mod server;

pub use acceptor::{ConnectionAcceptor, Listener};
pub use connection::{Connection, ConnectionHandle, ConnectionState};
pub use dispatch::{DispatchPool, IncomingPacket, PacketHandler};
pub use receiver::{ConnectionReceiver, ReceiverExit, ReceiverState};

/// Notifications from the transport to the messaging layer.
pub trait TransportEvents: Send + Sync + 'static {
    /// The connection to `peer_uri` failed while reading.
    fn communication_error(&self, peer_uri: &str);
}

impl<F> TransportEvents for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn communication_error(&self, peer_uri: &str) {
        self(peer_uri)
    }
}

/// State shared by the acceptor and every receiver of one server.
pub struct TransportContext {
    pub dispatch: DispatchPool,
    pub events: Arc<dyn TransportEvents>,
    pub metrics: Arc<Metrics>,
    pub max_packet_size: usize,
}

impl TransportContext {
    /// Build the context and spawn its dispatch workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &TransportConfig,
        handler: Arc<dyn PacketHandler>,
        events: Arc<dyn TransportEvents>,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let dispatch = DispatchPool::new(
            config.server.dispatch_workers,
            config.server.backpressure_limit,
            handler,
            metrics.clone(),
        );
        Self {
            dispatch,
            events,
            metrics,
            max_packet_size: config.framing.max_packet_size,
        }
    }
}
