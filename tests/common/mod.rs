//! Shared harness for transport tests
//!
//! `ScriptedListener` hands out in-memory duplex streams (or accept errors)
//! pushed by the test, so connection failures can be driven precisely.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mal_transport::config::TransportConfig;
use mal_transport::core::PacketCodec;
use mal_transport::error::{ProtocolError, Result};
use mal_transport::transport::server::start_server_with_shutdown;
use mal_transport::transport::{IncomingPacket, Listener, PacketHandler, TransportEvents};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

pub type PeerStream = Framed<DuplexStream, PacketCodec>;

pub struct ScriptedListener {
    incoming: mpsc::UnboundedReceiver<io::Result<DuplexStream>>,
    next_port: u16,
}

impl Listener for ScriptedListener {
    type Stream = DuplexStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(DuplexStream, SocketAddr)>> + Send {
        async move {
            match self.incoming.recv().await {
                Some(Ok(stream)) => {
                    self.next_port += 1;
                    Ok((stream, SocketAddr::from(([127, 0, 0, 1], self.next_port))))
                }
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }
    }
}

/// Records delivered packets and reported peers.
///
/// A payload of the form `uri:<name>` publishes `<name>` as the connection's
/// remote URI. Payloads `fail` and `panic` make the handler misbehave, and
/// `slow` is recorded only after a short delay.
#[derive(Default)]
pub struct Recorder {
    packets: Mutex<Vec<(u64, Vec<u8>)>>,
    reported: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn packets(&self) -> Vec<(u64, Vec<u8>)> {
        self.packets.lock().unwrap().clone()
    }

    pub fn packet_count(&self) -> usize {
        self.packets.lock().unwrap().len()
    }

    pub fn payloads_for(&self, connection: u64) -> Vec<Vec<u8>> {
        self.packets
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == connection)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn reported(&self) -> Vec<String> {
        self.reported.lock().unwrap().clone()
    }
}

impl PacketHandler for Recorder {
    fn handle_packet(&self, incoming: &IncomingPacket) -> Result<()> {
        let payload = incoming.packet.payload.as_ref();
        match payload {
            b"fail" => return Err(ProtocolError::Handler("refused".to_string())),
            b"panic" => panic!("handler panic"),
            b"slow" => std::thread::sleep(Duration::from_millis(50)),
            _ => {}
        }
        if let Some(uri) = payload.strip_prefix(b"uri:") {
            incoming
                .connection
                .set_remote_uri(String::from_utf8_lossy(uri).into_owned());
        }
        self.packets
            .lock()
            .unwrap()
            .push((incoming.connection.id(), payload.to_vec()));
        Ok(())
    }
}

impl TransportEvents for Recorder {
    fn communication_error(&self, peer_uri: &str) {
        self.reported.lock().unwrap().push(peer_uri.to_string());
    }
}

pub struct Harness {
    streams: mpsc::UnboundedSender<io::Result<DuplexStream>>,
    shutdown: mpsc::Sender<()>,
    server: JoinHandle<Result<()>>,
    pub recorder: Arc<Recorder>,
}

impl Harness {
    pub fn start(dispatch_workers: usize) -> Self {
        let config = TransportConfig::default_with_overrides(|c| {
            c.server.dispatch_workers = dispatch_workers;
            c.server.shutdown_timeout = Duration::from_secs(1);
        });
        Self::start_with(config)
    }

    pub fn start_with(config: TransportConfig) -> Self {
        let (streams, incoming) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let recorder = Arc::new(Recorder::default());

        let listener = ScriptedListener {
            incoming,
            next_port: 40_000,
        };
        let server = tokio::spawn(start_server_with_shutdown(
            listener,
            config,
            recorder.clone(),
            recorder.clone(),
            shutdown_rx,
        ));

        Self {
            streams,
            shutdown,
            server,
            recorder,
        }
    }

    /// Open a new in-memory connection to the server.
    pub fn connect(&self) -> PeerStream {
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.streams.send(Ok(server)).expect("listener gone");
        Framed::new(client, PacketCodec::default())
    }

    pub fn fail_next_accept(&self) {
        self.streams
            .send(Err(io::Error::new(io::ErrorKind::Other, "accept failed")))
            .expect("listener gone");
    }

    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(()).await;
        self.server.await.expect("server task panicked")
    }
}

/// Poll `check` until it holds, failing the test after five seconds.
pub async fn wait_for<F: Fn() -> bool>(what: &str, check: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
