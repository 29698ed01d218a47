//! The transport capability shared by both ends of a session.
//!
//! The duplex pump never sees a WebSocket or a socket directly.  It only talks
//! to [`Transport`], which gives a WebSocket endpoint and a TCP endpoint the
//! same three operations and the same closure semantics:
//!
//! - a graceful close by the peer is [`Received::EndOfStream`], not an error;
//! - zero-length reads never surface as data;
//! - `close()` is idempotent and wakes any `receive()`/`send()` pending on the
//!   same endpoint.
//!
//! Methods take `&self` so one loop can be receiving on an endpoint while the
//! other loop sends to it.

use async_trait::async_trait;
use thiserror::Error;

/// What a single `receive()` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A non-empty chunk of payload bytes.
    Data(Vec<u8>),
    /// The peer closed gracefully, or this endpoint was closed locally.
    EndOfStream,
}

/// A transport-level failure in the middle of a session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint was already closed when `send()` was called.
    #[error("endpoint is closed")]
    Closed,

    /// Writing to the endpoint failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading from the endpoint failed for a reason other than a graceful close.
    #[error("receive failed: {0}")]
    Receive(String),
}

/// One side of a relay session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Suspends until a chunk, end-of-stream, or an error is available.
    async fn receive(&self) -> Result<Received, TransportError>;

    /// Transmits `data` unchanged.
    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError>;

    /// Closes the endpoint.  Calling it again is a no-op.
    async fn close(&self);
}
