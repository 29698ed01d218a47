//! TCP side of a session: the backend connection.
//!
//! Each client session gets its own TCP connection to the backend.  The stream
//! is split into owned halves so one copy loop can sit in `read()` while the
//! other writes.  Closing the endpoint trips a [`CancellationToken`] that wakes
//! a pending read or write, then shuts down the write half (sending FIN).
//!
//! TCP is a stream protocol: a `read()` may return any number of bytes up to
//! the buffer size.  Chunks are forwarded as they arrive; no framing is
//! reconstructed.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::session_manager::BackendDialer;
use crate::application::transport::{Received, Transport, TransportError};

/// Read half plus its reusable buffer.
struct ReadSide {
    half: OwnedReadHalf,
    buf: Vec<u8>,
}

/// A [`Transport`] over a connected TCP stream.
pub struct TcpEndpoint {
    reader: Mutex<ReadSide>,
    writer: Mutex<OwnedWriteHalf>,
    peer_addr: Option<SocketAddr>,
    closed: CancellationToken,
    close_started: AtomicBool,
}

impl TcpEndpoint {
    /// Wraps a connected stream.  Each `receive()` reads at most
    /// `read_buffer_size` bytes.
    pub fn new(stream: TcpStream, read_buffer_size: usize) -> Self {
        let peer_addr = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: Mutex::new(ReadSide {
                half: read_half,
                buf: vec![0u8; read_buffer_size.max(1)],
            }),
            writer: Mutex::new(write_half),
            peer_addr,
            closed: CancellationToken::new(),
            close_started: AtomicBool::new(false),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl Transport for TcpEndpoint {
    async fn receive(&self) -> Result<Received, TransportError> {
        let mut reader = self.reader.lock().await;
        let ReadSide { half, buf } = &mut *reader;

        let n = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Ok(Received::EndOfStream),
            read = half.read(buf) => read.map_err(|e| TransportError::Receive(e.to_string()))?,
        };

        if n == 0 {
            // `read()` returned 0 bytes: the backend closed its side (EOF).
            debug!("backend {:?}: TCP EOF", self.peer_addr);
            return Ok(Received::EndOfStream);
        }
        Ok(Received::Data(buf[..n].to_vec()))
    }

    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock().await;

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            written = writer.write_all(&data) => {
                written.map_err(|e| TransportError::Send(e.to_string()))
            }
        }
    }

    async fn close(&self) {
        if self.close_started.swap(true, Ordering::SeqCst) {
            return;
        }
        // Cancel first so a writer parked in `write_all` drops the lock.
        self.closed.cancel();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("backend {:?}: shutdown: {e}", self.peer_addr);
        }
    }
}

/// Dials the backend over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    read_buffer_size: usize,
}

impl TcpDialer {
    pub fn new(read_buffer_size: usize) -> Self {
        Self { read_buffer_size }
    }
}

#[async_trait]
impl BackendDialer for TcpDialer {
    type Endpoint = TcpEndpoint;

    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpEndpoint> {
        // Resolves `host` (name or literal IP) and tries each address in turn.
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(TcpEndpoint::new(stream, self.read_buffer_size))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
