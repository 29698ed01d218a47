//! The duplex pump: two copy loops with a joint lifecycle.
//!
//! ```text
//!            ┌──────── client->backend loop ────────┐
//!  client ───┤ receive()                    send()  ├──▶ backend
//!            └──────────────────────────────────────┘
//!            ┌──────── backend->client loop ────────┐
//!  client ◀──┤ send()                    receive()  ├─── backend
//!            └──────────────────────────────────────┘
//! ```
//!
//! Each loop runs on its own Tokio task.  When a loop stops, for whatever
//! reason, it closes its destination and fires the session-wide shutdown
//! token.  Its destination is the sibling loop's source, so the sibling sees
//! end-of-stream on its next `receive()`; the token additionally releases a
//! sibling that is parked inside `send()`.  [`run_pump`] returns only after
//! both tasks have been joined.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::application::transport::{Received, Transport};
use crate::domain::{Direction, LoopOutcome, PumpOutcome, SessionId, TerminationReason};

/// Runs both copy loops for one session and waits for both to finish.
///
/// Every exit path closes both endpoints before this function returns.  A
/// loop task that panics is reported as [`TerminationReason::LocalError`]
/// with zero bytes; it never propagates to the caller.
pub async fn run_pump<C, B>(client: Arc<C>, backend: Arc<B>, session_id: SessionId) -> PumpOutcome
where
    C: Transport + ?Sized + 'static,
    B: Transport + ?Sized + 'static,
{
    let shutdown = CancellationToken::new();

    let client_to_backend = tokio::spawn(copy_loop(
        Arc::clone(&client),
        Arc::clone(&backend),
        Direction::ClientToBackend,
        shutdown.clone(),
        session_id,
    ));
    let backend_to_client = tokio::spawn(copy_loop(
        Arc::clone(&backend),
        Arc::clone(&client),
        Direction::BackendToClient,
        shutdown.clone(),
        session_id,
    ));

    let (c2b, b2c) = tokio::join!(client_to_backend, backend_to_client);

    let panicked = c2b.is_err() || b2c.is_err();
    let client_to_backend = joined(c2b, Direction::ClientToBackend, session_id);
    let backend_to_client = joined(b2c, Direction::BackendToClient, session_id);

    // A panicked loop never ran its own teardown.
    if panicked {
        client.close().await;
        backend.close().await;
    }

    PumpOutcome {
        client_to_backend,
        backend_to_client,
    }
}

fn joined(
    result: Result<LoopOutcome, tokio::task::JoinError>,
    direction: Direction,
    session_id: SessionId,
) -> LoopOutcome {
    result.unwrap_or_else(|e| {
        warn!("session {session_id}: {direction} task failed: {e}");
        LoopOutcome {
            direction,
            bytes_transferred: 0,
            chunks_transferred: 0,
            reason: TerminationReason::LocalError,
        }
    })
}

/// Copies chunks from `source` to `destination` until one side stops.
async fn copy_loop<S, D>(
    source: Arc<S>,
    destination: Arc<D>,
    direction: Direction,
    shutdown: CancellationToken,
    session_id: SessionId,
) -> LoopOutcome
where
    S: Transport + ?Sized,
    D: Transport + ?Sized,
{
    let mut bytes_transferred: u64 = 0;
    let mut chunks_transferred: u64 = 0;

    let reason = loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break TerminationReason::PeerClosed,
            received = source.receive() => received,
        };

        let chunk = match received {
            Ok(Received::Data(chunk)) => chunk,
            Ok(Received::EndOfStream) => {
                debug!("session {session_id}: {direction} source closed");
                break TerminationReason::PeerClosed;
            }
            Err(e) => {
                warn!(
                    "session {session_id}: {direction} receive error after {bytes_transferred} bytes: {e}"
                );
                break TerminationReason::RemoteError;
            }
        };

        if chunk.is_empty() {
            continue;
        }

        let len = chunk.len() as u64;
        let sent = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break TerminationReason::PeerClosed,
            sent = destination.send(chunk) => sent,
        };
        if let Err(e) = sent {
            warn!("session {session_id}: {direction} send error after {bytes_transferred} bytes: {e}");
            break TerminationReason::LocalError;
        }

        bytes_transferred += len;
        chunks_transferred += 1;
        trace!("session {session_id}: {direction} {len} bytes");
    };

    destination.close().await;
    shutdown.cancel();

    debug!(
        "session {session_id}: {direction} ended ({reason:?}, {bytes_transferred} bytes in {chunks_transferred} chunks)"
    );

    LoopOutcome {
        direction,
        bytes_transferred,
        chunks_transferred,
        reason,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
