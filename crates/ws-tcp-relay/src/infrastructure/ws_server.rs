//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from clients.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Handing the upgraded connection to the [`SessionManager`], which dials
//!    the backend and runs the duplex pump.
//! 5. Gracefully shutting down when the `running` flag is cleared.
//!
//! # Scalability
//!
//! Each client session runs in its own Tokio task.  The accept loop never
//! waits on a session: it accepts a connection and immediately spawns a task
//! for it before accepting the next one, so sessions run concurrently and a
//! slow or failing session never delays the others.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tracing::{error, info, warn};

use crate::application::session_manager::{BackendDialer, SessionManager};
use crate::domain::config::RelayConfig;
use crate::infrastructure::tcp_endpoint::TcpDialer;
use crate::infrastructure::ws_endpoint::WsEndpoint;

/// How often the accept loop re-checks the shutdown flag while idle.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.listen_host:config.listen_port` and relays every accepted
/// client to the configured backend until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (e.g., the port is already
/// in use or the process lacks permission to bind).
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind((config.listen_host.as_str(), config.listen_port))
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {listen_addr}"))?;

    let dialer = TcpDialer::new(config.read_buffer_size);
    let manager = Arc::new(SessionManager::new(Arc::new(config), dialer));

    run_listener(listener, manager, running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// Split out from [`run_server`] so callers can bind an ephemeral port first
/// and learn its address.
///
/// # Errors
///
/// Currently only fails if the listener's local address cannot be read.
pub async fn run_listener<D>(
    listener: TcpListener,
    manager: Arc<SessionManager<D>>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()>
where
    D: BackendDialer + 'static,
{
    let local_addr = listener
        .local_addr()
        .context("failed to read listener address")?;
    info!(
        "relay listening on {local_addr}, forwarding to {}",
        manager.config().backend_addr()
    );

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout lets the loop notice the shutdown flag even when no
        // clients are connecting.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new client connection from {peer_addr}");
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    handle_client(stream, peer_addr, manager).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Completes the WebSocket upgrade and runs the session.
///
/// Every failure is logged here; nothing propagates back to the accept loop.
async fn handle_client<D>(raw_stream: TcpStream, peer_addr: SocketAddr, manager: Arc<SessionManager<D>>)
where
    D: BackendDialer + 'static,
{
    if let Err(e) = raw_stream.set_nodelay(true) {
        warn!("client {peer_addr}: set_nodelay failed: {e}");
    }

    let ws_stream = match accept_async(raw_stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("client {peer_addr}: WebSocket handshake failed: {e}");
            return;
        }
    };

    let report = manager.handle_new_client(WsEndpoint::new(ws_stream)).await;
    match report.result {
        Ok(outcome) if outcome.is_clean() => {
            info!("client {peer_addr}: session {} closed normally", report.session_id)
        }
        Ok(_) => warn!(
            "client {peer_addr}: session {} closed after a transport error",
            report.session_id
        ),
        Err(e) => warn!(
            "client {peer_addr}: session {} aborted: {e}",
            report.session_id
        ),
    }
}
