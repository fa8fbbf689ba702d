//! Server entry points.
//!
//! `start_server` binds the configured TCP address and stops on ctrl-c.
//! `start_server_with_shutdown` runs on any [`Listener`] and stops when its
//! shutdown channel fires. On shutdown the acceptor stops first, then open
//! connections get `shutdown_timeout` to finish before they are cancelled.
//! Both return only after every receiver has exited and every packet already
//! queued for dispatch has been handled.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{info, instrument, warn};

use crate::config::TransportConfig;
use crate::error::Result;
use crate::transport::acceptor::{ConnectionAcceptor, Listener};
use crate::transport::dispatch::PacketHandler;
use crate::transport::{TransportContext, TransportEvents};
use crate::utils::metrics::{Metrics, Timer};

const DRAIN_LOG_INTERVAL: Duration = Duration::from_millis(100);

/// Start a TCP server for the configured address
#[instrument(skip_all, fields(address = %config.server.address))]
pub async fn start_server(
    config: TransportConfig,
    handler: Arc<dyn PacketHandler>,
    events: Arc<dyn TransportEvents>,
) -> Result<()> {
    config.validate_strict()?;

    let listener = TcpListener::bind(&config.server.address).await?;
    info!(address = %config.server.address, "Listening");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(listener, config, handler, events, shutdown_rx).await
}

/// Run a server on `listener` until `shutdown_rx` fires
#[instrument(skip_all)]
pub async fn start_server_with_shutdown<L: Listener>(
    listener: L,
    config: TransportConfig,
    handler: Arc<dyn PacketHandler>,
    events: Arc<dyn TransportEvents>,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let context = Arc::new(TransportContext::new(&config, handler, events));
    let metrics = context.metrics.clone();

    let acceptor = ConnectionAcceptor::new(listener, context.clone());
    let connections = acceptor.connections_token();
    let receivers = acceptor.receivers();
    acceptor.run(shutdown_rx).await;
    receivers.close();

    info!("Shutting down server. Waiting for connections to close...");
    let _timer = Timer::start("shutdown_drain");
    if !drain(&receivers, &metrics, config.server.shutdown_timeout).await {
        warn!("Shutdown timeout reached, closing remaining connections");
        connections.cancel();
        receivers.wait().await;
    }

    context.dispatch.shutdown().await;
    info!("Dispatch queues drained");

    metrics.log_metrics();
    Ok(())
}

/// Wait for every receiver to exit. False on timeout.
async fn drain(receivers: &TaskTracker, metrics: &Metrics, timeout: Duration) -> bool {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut progress = tokio::time::interval(DRAIN_LOG_INTERVAL);

    loop {
        tokio::select! {
            _ = receivers.wait() => {
                info!("All connections closed, shutting down");
                return true;
            }
            _ = &mut deadline => return false,
            _ = progress.tick() => {
                let connections = metrics.active_connections();
                info!(connections = %connections, "Waiting for connections to close");
            }
        }
    }
}
