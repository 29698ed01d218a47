//! Per-client session orchestration.
//!
//! [`SessionManager::handle_new_client`] owns one session from accept to
//! teardown:
//!
//! 1. Dial the backend, bounded by `connect_timeout_secs`.
//! 2. On failure, close the client and report [`RelayError`].  No bytes move.
//! 3. On success, run the duplex pump and wait for both loops.
//! 4. Close both endpoints (idempotent, so repeats after the pump are safe).
//!
//! Nothing a session does can escape as a panic or error into the caller's
//! accept loop; the outcome is returned as a [`SessionReport`] and logged.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::application::pump::run_pump;
use crate::application::transport::Transport;
use crate::domain::{PumpOutcome, RelayConfig, SessionId, SessionLifecycle, SessionState};

/// Failures that stop a session before any pumping starts.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The backend dial did not complete within the configured bound.
    #[error("timed out after {timeout:?} connecting to backend {addr}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// The backend dial failed (refused, DNS, reset, ...).
    #[error("failed to connect to backend {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Opens the outbound connection for a session.
///
/// The production implementation dials TCP; tests substitute in-memory or
/// never-completing dialers.
#[async_trait]
pub trait BackendDialer: Send + Sync {
    type Endpoint: Transport + 'static;

    async fn dial(&self, host: &str, port: u16) -> io::Result<Self::Endpoint>;
}

/// What happened to one session.
#[derive(Debug)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub final_state: SessionState,
    pub result: Result<PumpOutcome, RelayError>,
}

/// One live client/backend pairing.
struct Session<C: ?Sized, B: ?Sized> {
    id: SessionId,
    lifecycle: SessionLifecycle,
    client: Arc<C>,
    backend: Arc<B>,
}

impl<C, B> Session<C, B>
where
    C: Transport + ?Sized + 'static,
    B: Transport + ?Sized + 'static,
{
    fn advance(&mut self, next: SessionState) {
        if let Err(e) = self.lifecycle.transition(next) {
            warn!("session {}: {e}", self.id);
        }
    }

    async fn run(mut self) -> (SessionState, PumpOutcome) {
        self.advance(SessionState::Active);
        let outcome = run_pump(Arc::clone(&self.client), Arc::clone(&self.backend), self.id).await;

        self.advance(SessionState::Closing);
        self.client.close().await;
        self.backend.close().await;
        self.advance(SessionState::Closed);

        (self.lifecycle.state(), outcome)
    }
}

/// Decrements the active-session counter however the session ends.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Creates and runs sessions against one statically configured backend.
pub struct SessionManager<D> {
    config: Arc<RelayConfig>,
    dialer: D,
    active: AtomicUsize,
}

impl<D: BackendDialer> SessionManager<D> {
    pub fn new(config: Arc<RelayConfig>, dialer: D) -> Self {
        Self {
            config,
            dialer,
            active: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Number of sessions currently between accept and teardown.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Runs a complete session for an already-accepted client endpoint.
    pub async fn handle_new_client<C>(&self, client: C) -> SessionReport
    where
        C: Transport + 'static,
    {
        let _active = ActiveGuard::enter(&self.active);
        let session_id = SessionId::new();
        let mut lifecycle = SessionLifecycle::new();
        info!("session {session_id}: new client");

        let backend = match self.connect_backend().await {
            Ok(backend) => backend,
            Err(e) => {
                warn!("session {session_id}: {e}");
                client.close().await;
                if let Err(e) = lifecycle.transition(SessionState::Closed) {
                    warn!("session {session_id}: {e}");
                }
                return SessionReport {
                    session_id,
                    final_state: lifecycle.state(),
                    result: Err(e),
                };
            }
        };

        info!(
            "session {session_id}: connected to backend {}",
            self.config.backend_addr()
        );

        let session = Session {
            id: session_id,
            lifecycle,
            client: Arc::new(client),
            backend: Arc::new(backend),
        };
        let (final_state, outcome) = session.run().await;

        let c2b = &outcome.client_to_backend;
        let b2c = &outcome.backend_to_client;
        info!(
            "session {session_id}: client disconnected (requests: {} bytes/{} chunks, {:?}; replies: {} bytes/{} chunks, {:?})",
            c2b.bytes_transferred,
            c2b.chunks_transferred,
            c2b.reason,
            b2c.bytes_transferred,
            b2c.chunks_transferred,
            b2c.reason,
        );

        SessionReport {
            session_id,
            final_state,
            result: Ok(outcome),
        }
    }

    async fn connect_backend(&self) -> Result<D::Endpoint, RelayError> {
        let addr = self.config.backend_addr();
        let bound = self.config.connect_timeout();

        match timeout(
            bound,
            self.dialer
                .dial(&self.config.backend_host, self.config.backend_port),
        )
        .await
        {
            Ok(Ok(endpoint)) => Ok(endpoint),
            Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => Err(RelayError::ConnectTimeout {
                addr,
                timeout: bound,
            }),
            Ok(Err(source)) => Err(RelayError::ConnectFailed { addr, source }),
            Err(_) => Err(RelayError::ConnectTimeout {
                addr,
                timeout: bound,
            }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
