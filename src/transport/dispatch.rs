//! Asynchronous packet dispatch.
//!
//! Receivers hand complete packets to a [`DispatchPool`] and go straight back
//! to reading. The pool runs the outer [`PacketHandler`] on a fixed set of
//! workers, each fed by its own bounded queue.
//!
//! A connection is pinned to queue `id % workers`, so packets from one
//! connection are handled in the order they were read while different
//! connections proceed concurrently. A full queue makes `submit` wait, which
//! in turn stops the submitting receiver from reading.
//!
//! [`DispatchPool::shutdown`] refuses further packets, lets the workers work
//! through what is already queued, and returns once they have stopped.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::Packet;
use crate::error::{ProtocolError, Result};
use crate::transport::connection::ConnectionHandle;
use crate::utils::metrics::Metrics;

/// One packet read from a connection, with the connection it came from.
#[derive(Debug, Clone)]
pub struct IncomingPacket {
    pub connection: ConnectionHandle,
    pub packet: Packet,
}

/// Builds a message from raw packet bytes and delivers it to the messaging
/// layer.
///
/// Runs on the blocking pool. An error or panic affects only the packet being
/// handled.
pub trait PacketHandler: Send + Sync + 'static {
    fn handle_packet(&self, incoming: &IncomingPacket) -> Result<()>;
}

impl<F> PacketHandler for F
where
    F: Fn(&IncomingPacket) -> Result<()> + Send + Sync + 'static,
{
    fn handle_packet(&self, incoming: &IncomingPacket) -> Result<()> {
        self(incoming)
    }
}

pub struct DispatchPool {
    queues: Vec<mpsc::Sender<IncomingPacket>>,
    closing: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchPool {
    /// Spawn `workers` dispatch workers, each with a queue of `queue_depth`.
    ///
    /// Must be called from within a Tokio runtime. Zero values are raised to one.
    pub fn new(
        workers: usize,
        queue_depth: usize,
        handler: Arc<dyn PacketHandler>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let workers = workers.max(1);
        let queue_depth = queue_depth.max(1);

        let closing = CancellationToken::new();
        let mut queues = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let (tx, rx) = mpsc::channel(queue_depth);
            queues.push(tx);
            handles.push(tokio::spawn(run_worker(
                index,
                rx,
                closing.clone(),
                handler.clone(),
                metrics.clone(),
            )));
        }

        Self {
            queues,
            closing,
            workers: Mutex::new(handles),
        }
    }

    pub fn workers(&self) -> usize {
        self.queues.len()
    }

    /// Queue a packet on its connection's worker.
    ///
    /// Waits only for queue admission, never for the handler.
    pub async fn submit(&self, incoming: IncomingPacket) -> Result<()> {
        let shard = (incoming.connection.id() % self.queues.len() as u64) as usize;
        self.queues[shard]
            .send(incoming)
            .await
            .map_err(|_| ProtocolError::DispatchClosed)
    }

    /// Stop accepting packets and wait for the queued ones to be handled.
    ///
    /// A `submit` waiting for room, or made afterwards, fails with
    /// `DispatchClosed`.
    pub async fn shutdown(&self) {
        self.closing.cancel();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Dispatch worker terminated abnormally");
            }
        }
    }
}

async fn run_worker(
    index: usize,
    mut rx: mpsc::Receiver<IncomingPacket>,
    closing: CancellationToken,
    handler: Arc<dyn PacketHandler>,
    metrics: Arc<Metrics>,
) {
    debug!(worker = index, "Dispatch worker started");

    loop {
        let next = tokio::select! {
            biased;
            next = rx.recv() => next,
            _ = closing.cancelled() => {
                // a closed queue still yields what it holds, then None
                rx.close();
                rx.recv().await
            }
        };
        let Some(incoming) = next else { break };

        let connection = incoming.connection.id();
        let handler = handler.clone();
        let outcome = tokio::task::spawn_blocking(move || handler.handle_packet(&incoming)).await;

        match outcome {
            Ok(Ok(())) => metrics.packet_dispatched(),
            Ok(Err(e)) => {
                metrics.handler_error();
                warn!(worker = index, connection, error = %e, "Packet handler failed");
            }
            Err(e) => {
                metrics.handler_error();
                error!(worker = index, connection, error = %e, "Packet handler panicked");
            }
        }
    }

    debug!(worker = index, "Dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::PacketCodec;
    use crate::transport::connection::Connection;
    use std::time::Duration;

    fn connection(id: u64) -> ConnectionHandle {
        let (_peer, local) = tokio::io::duplex(64);
        Arc::new(Connection::new(
            id,
            "127.0.0.1:4000".parse().unwrap(),
            local,
            PacketCodec::default(),
            CancellationToken::new(),
        ))
    }

    #[tokio::test]
    async fn test_handler_errors_and_panics_are_contained() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |incoming: &IncomingPacket| -> Result<()> {
            match incoming.packet.payload[0] {
                0 => Err(ProtocolError::Handler("rejected".into())),
                1 => panic!("handler bug"),
                n => {
                    sink.lock().unwrap().push(n);
                    Ok(())
                }
            }
        };

        let metrics = Arc::new(Metrics::new());
        let pool = DispatchPool::new(1, 4, Arc::new(handler), metrics.clone());
        let conn = connection(1);
        for byte in [0u8, 1, 2] {
            let packet = Packet::new(vec![byte]);
            pool.submit(IncomingPacket {
                connection: conn.clone(),
                packet,
            })
            .await
            .unwrap();
        }
        pool.shutdown().await;

        assert_eq!(*seen.lock().unwrap(), vec![2]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.handler_errors, 2);
        assert_eq!(snapshot.packets_dispatched, 1);
    }

    #[tokio::test]
    async fn test_submit_after_workers_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let pool = DispatchPool {
            queues: vec![tx],
            closing: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        };
        let result = pool
            .submit(IncomingPacket {
                connection: connection(3),
                packet: Packet::new(vec![1u8]),
            })
            .await;
        assert!(matches!(result, Err(ProtocolError::DispatchClosed)));
    }

    #[tokio::test]
    async fn test_shutdown_handles_queued_packets_then_refuses_more() {
        let handled = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = handled.clone();
        let handler = move |incoming: &IncomingPacket| -> Result<()> {
            std::thread::sleep(Duration::from_millis(20));
            sink.lock().unwrap().push(incoming.packet.payload[0]);
            Ok(())
        };

        let metrics = Arc::new(Metrics::new());
        let pool = DispatchPool::new(2, 8, Arc::new(handler), metrics.clone());
        let (a, b) = (connection(1), connection(2));
        for byte in 0u8..6 {
            let connection = if byte % 2 == 0 { a.clone() } else { b.clone() };
            pool.submit(IncomingPacket {
                connection,
                packet: Packet::new(vec![byte]),
            })
            .await
            .unwrap();
        }

        pool.shutdown().await;

        let mut seen = handled.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(metrics.snapshot().packets_dispatched, 6);

        let late = pool
            .submit(IncomingPacket {
                connection: a,
                packet: Packet::new(vec![9u8]),
            })
            .await;
        assert!(matches!(late, Err(ProtocolError::DispatchClosed)));
    }
}
