//! WebSocket side of a session: the client connection.
//!
//! The upgraded stream is split into a sink and a stream so the two copy loops
//! can use it concurrently.  Frame handling:
//!
//! | Incoming frame        | Surfaces as                         |
//! |-----------------------|-------------------------------------|
//! | Binary (non-empty)    | `Received::Data`                    |
//! | Text (non-empty)      | `Received::Data` (UTF-8 bytes)      |
//! | Binary/Text (empty)   | skipped                             |
//! | Ping / Pong / Frame   | skipped (control traffic)           |
//! | Close, end of stream  | `Received::EndOfStream`             |
//!
//! Outgoing data is always sent as Binary frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::transport::{Received, Transport, TransportError};

/// Upper bound on flushing the Close frame to the client.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A [`Transport`] over an established WebSocket connection.
pub struct WsEndpoint<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, WsMessage>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
    closed: CancellationToken,
    close_started: AtomicBool,
}

impl<S> WsEndpoint<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps a WebSocket whose handshake has already completed.
    pub fn new(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: CancellationToken::new(),
            close_started: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Errors that mean "the peer went away" rather than "something broke".
fn is_benign_close(e: &WsError) -> bool {
    matches!(
        e,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

#[async_trait]
impl<S> Transport for WsEndpoint<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn receive(&self) -> Result<Received, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.closed.cancelled() => return Ok(Received::EndOfStream),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(WsMessage::Binary(data))) => {
                    if !data.is_empty() {
                        return Ok(Received::Data(data));
                    }
                }
                Some(Ok(WsMessage::Text(text))) => {
                    if !text.is_empty() {
                        return Ok(Received::Data(text.into_bytes()));
                    }
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("client sent Close frame: {frame:?}");
                    return Ok(Received::EndOfStream);
                }
                Some(Err(e)) if is_benign_close(&e) => {
                    debug!("client WebSocket closed: {e}");
                    return Ok(Received::EndOfStream);
                }
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
                None => return Ok(Received::EndOfStream),
            }
        }
    }

    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let mut sink = self.sink.lock().await;

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            sent = sink.send(WsMessage::Binary(data)) => {
                sent.map_err(|e| TransportError::Send(e.to_string()))
            }
        }
    }

    async fn close(&self) {
        if self.close_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.closed.cancel();
        // Sends a Close frame and flushes; errors mean the peer is already gone.
        // A client that stopped reading can stall the flush, so it is bounded.
        let flushed = timeout(CLOSE_TIMEOUT, async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        })
        .await;
        match flushed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("client WebSocket close: {e}"),
            Err(_) => debug!("client WebSocket close not flushed within {CLOSE_TIMEOUT:?}; dropping"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
