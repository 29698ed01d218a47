//! In-memory transport for tests.
//!
//! [`MockEndpoint`] implements [`Transport`] on top of unbounded channels.  The
//! paired [`MockRemote`] plays the peer: it scripts what `receive()` returns
//! and observes every chunk the relay sends.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::transport::{Received, Transport, TransportError};

/// One scripted `receive()` result.
#[derive(Debug)]
enum Scripted {
    Chunk(Vec<u8>),
    EndOfStream,
    Error(String),
}

/// State shared between an endpoint and its remote.
#[derive(Debug, Default)]
struct Shared {
    closed: CancellationToken,
    close_calls: AtomicUsize,
    fail_sends: AtomicBool,
}

/// The relay-facing half of an in-memory connection.
pub struct MockEndpoint {
    inbound: Mutex<mpsc::UnboundedReceiver<Scripted>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    shared: Arc<Shared>,
}

/// The test-facing half: feeds the endpoint and watches what it sends.
pub struct MockRemote {
    inbound: mpsc::UnboundedSender<Scripted>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    shared: Arc<Shared>,
}

impl MockEndpoint {
    /// Creates a connected endpoint/remote pair.
    pub fn pair() -> (MockEndpoint, MockRemote) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        (
            MockEndpoint {
                inbound: Mutex::new(in_rx),
                outbound: out_tx,
                shared: Arc::clone(&shared),
            },
            MockRemote {
                inbound: in_tx,
                outbound: out_rx,
                shared,
            },
        )
    }
}

impl MockRemote {
    /// Queues a chunk for the endpoint's next `receive()`.  Empty chunks are
    /// delivered as-is so tests can exercise the zero-length path.
    pub fn push(&self, data: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(Scripted::Chunk(data.into()));
    }

    /// Queues a graceful end-of-stream.
    pub fn finish(&self) {
        let _ = self.inbound.send(Scripted::EndOfStream);
    }

    /// Queues a receive failure.
    pub fn fail_receive(&self, reason: &str) {
        let _ = self.inbound.send(Scripted::Error(reason.to_string()));
    }

    /// Makes every subsequent `send()` on the endpoint fail.
    pub fn fail_sends(&self) {
        self.shared.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Waits for the next chunk the relay sent to this endpoint.
    ///
    /// Returns `None` once the endpoint has been dropped and everything it
    /// sent has been drained.
    pub async fn next_sent(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    /// Drains every chunk sent so far without waiting.
    pub fn drain_sent(&mut self) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Ok(chunk) = self.outbound.try_recv() {
            out.push(chunk);
        }
        out
    }

    /// Resolves once the relay has closed the endpoint.
    pub async fn closed(&self) {
        self.shared.closed.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// How many times `close()` was called, including no-op repeats.
    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockEndpoint {
    async fn receive(&self) -> Result<Received, TransportError> {
        let mut inbound = self.inbound.lock().await;
        let next = tokio::select! {
            biased;
            _ = self.shared.closed.cancelled() => return Ok(Received::EndOfStream),
            next = inbound.recv() => next,
        };
        match next {
            Some(Scripted::Chunk(data)) => Ok(Received::Data(data)),
            Some(Scripted::Error(reason)) => Err(TransportError::Receive(reason)),
            Some(Scripted::EndOfStream) | None => Ok(Received::EndOfStream),
        }
    }

    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        if self.shared.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("injected failure".to_string()));
        }
        self.outbound
            .send(data)
            .map_err(|_| TransportError::Send("remote dropped".to_string()))
    }

    async fn close(&self) {
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.closed.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
