//! End-to-end tests: real WebSocket clients, the real accept loop, and real
//! TCP backends on ephemeral ports.
//!
//! ```text
//! connect_async client ──ws──▶ run_listener ──tcp──▶ test backend
//! ```
//!
//! Every wait is bounded by [`WAIT`] so a regression shows up as a failed
//! assertion instead of a hung test run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ws_tcp_relay::application::SessionManager;
use ws_tcp_relay::domain::RelayConfig;
use ws_tcp_relay::infrastructure::{run_listener, TcpDialer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(10);

// ── Harness ───────────────────────────────────────────────────────────────────

struct Relay {
    url: String,
    running: Arc<AtomicBool>,
    task: JoinHandle<anyhow::Result<()>>,
}

/// Starts a relay on an ephemeral port forwarding to `127.0.0.1:backend_port`.
async fn start_relay(backend_port: u16) -> Relay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = RelayConfig {
        listen_host: "127.0.0.1".to_string(),
        listen_port: addr.port(),
        backend_host: "127.0.0.1".to_string(),
        backend_port,
        connect_timeout_secs: 5,
        read_buffer_size: 16 * 1024,
        ..RelayConfig::default()
    };
    let dialer = TcpDialer::new(config.read_buffer_size);
    let manager = Arc::new(SessionManager::new(Arc::new(config), dialer));
    let running = Arc::new(AtomicBool::new(true));
    let task = tokio::spawn(run_listener(listener, manager, Arc::clone(&running)));

    Relay {
        url: format!("ws://{addr}"),
        running,
        task,
    }
}

async fn connect(relay: &Relay) -> Client {
    let (ws, _response) = timeout(WAIT, connect_async(relay.url.as_str()))
        .await
        .expect("connect timed out")
        .expect("WebSocket connect failed");
    ws
}

/// A backend that echoes every byte back on every connection.
async fn start_echo_backend() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = stream.into_split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
                let _ = write.shutdown().await;
            });
        }
    });
    port
}

/// A backend that records everything it receives on its first connection
/// and reports it once the relay closes the connection.
async fn start_recording_backend() -> (u16, oneshot::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut received = Vec::new();
            let _ = stream.read_to_end(&mut received).await;
            let _ = tx.send(received);
        }
    });
    (port, rx)
}

/// A port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Reads binary payload until the relay closes the WebSocket.
async fn collect_until_close(client: &mut Client) -> Vec<u8> {
    let mut collected = Vec::new();
    loop {
        match client.next().await {
            Some(Ok(WsMessage::Binary(data))) => collected.extend_from_slice(&data),
            Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }
    collected
}

/// Next binary frame, skipping control frames.
async fn next_binary(client: &mut Client) -> Vec<u8> {
    loop {
        match timeout(WAIT, client.next()).await.expect("read timed out") {
            Some(Ok(WsMessage::Binary(data))) => return data,
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
            other => panic!("expected a binary frame, got {other:?}"),
        }
    }
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

// ── Relay behaviour ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_three_byte_echo_round_trip() {
    // Arrange
    let relay = start_relay(start_echo_backend().await).await;
    let mut client = connect(&relay).await;

    // Act
    client
        .send(WsMessage::Binary(vec![0x01, 0x02, 0x03]))
        .await
        .unwrap();
    let reply = next_binary(&mut client).await;

    // Assert
    assert_eq!(reply, vec![0x01, 0x02, 0x03]);
}

#[tokio::test]
async fn test_client_stream_reaches_backend_exactly_and_in_order() {
    // Arrange
    let (port, received) = start_recording_backend().await;
    let relay = start_relay(port).await;
    let mut client = connect(&relay).await;

    let mut expected = Vec::new();
    for i in 0..200u8 {
        let chunk = pattern(1000 + i as usize, i);
        expected.extend_from_slice(&chunk);
        client.send(WsMessage::Binary(chunk)).await.unwrap();
    }

    // Act: closing the client propagates a half-close to the backend
    client.close(None).await.unwrap();
    let at_backend = timeout(WAIT, received).await.unwrap().unwrap();

    // Assert
    assert_eq!(at_backend.len(), expected.len());
    assert_eq!(at_backend, expected);
}

#[tokio::test]
async fn test_backend_stream_reaches_client_exactly_and_in_order() {
    // Arrange: the backend writes a large blob, then closes
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let blob = pattern(512 * 1024, 7);
    let to_send = blob.clone();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(&to_send).await.unwrap();
        stream.shutdown().await.unwrap();
    });

    let relay = start_relay(port).await;
    let mut client = connect(&relay).await;

    // Act
    let at_client = timeout(WAIT, collect_until_close(&mut client))
        .await
        .unwrap();

    // Assert: every byte, in order, then a graceful close
    assert_eq!(at_client, blob);
}

#[tokio::test]
async fn test_zero_length_frames_are_dropped_without_ending_session() {
    let (port, received) = start_recording_backend().await;
    let relay = start_relay(port).await;
    let mut client = connect(&relay).await;

    client.send(WsMessage::Binary(Vec::new())).await.unwrap();
    client.send(WsMessage::Binary(vec![5])).await.unwrap();
    client.send(WsMessage::Binary(Vec::new())).await.unwrap();
    client.send(WsMessage::Binary(vec![6])).await.unwrap();
    client.close(None).await.unwrap();

    let at_backend = timeout(WAIT, received).await.unwrap().unwrap();
    assert_eq!(at_backend, vec![5, 6]);
}

#[tokio::test]
async fn test_client_close_closes_backend_while_backend_keeps_sending() {
    // Arrange: a backend that never stops writing and reports when it sees EOF
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (eof_tx, eof_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut read, mut write) = stream.into_split();
        tokio::spawn(async move {
            while write.write_all(b"tick").await.is_ok() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });
        let mut buf = [0u8; 64];
        loop {
            match read.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = eof_tx.send(());
    });

    let relay = start_relay(port).await;
    let mut client = connect(&relay).await;
    let first = next_binary(&mut client).await;
    assert!(!first.is_empty());

    // Act
    client.close(None).await.unwrap();

    // Assert: the relay closed its backend connection
    timeout(WAIT, eof_rx)
        .await
        .expect("backend never saw the relay close")
        .unwrap();
}

#[tokio::test]
async fn test_backend_close_closes_client_while_client_keeps_sending() {
    // Arrange: a backend that hangs up as soon as it accepts
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let relay = start_relay(port).await;
    let client = connect(&relay).await;
    let (mut sink, mut stream) = client.split();

    // Act: keep sending in the background
    let sender = tokio::spawn(async move {
        while sink.send(WsMessage::Binary(vec![1; 32])).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    // Assert: the client observes the close without receiving any payload
    let mut payload = 0usize;
    let closed = timeout(WAIT, async {
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => payload += data.len(),
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "client was never closed");
    assert_eq!(payload, 0);
    sender.abort();
}

#[tokio::test]
async fn test_unreachable_backend_closes_client_without_data() {
    // Arrange
    let relay = start_relay(closed_port().await).await;
    let mut client = connect(&relay).await;

    // Act: anything the client sends has nowhere to go
    let _ = client.send(WsMessage::Binary(vec![1, 2, 3])).await;
    let at_client = timeout(WAIT, collect_until_close(&mut client))
        .await
        .expect("client was never closed");

    // Assert
    assert!(at_client.is_empty());
}

#[tokio::test]
async fn test_closing_one_session_leaves_others_running() {
    // Arrange
    let relay = start_relay(start_echo_backend().await).await;
    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(connect(&relay).await);
    }
    for (i, client) in clients.iter_mut().enumerate() {
        client.send(WsMessage::Binary(vec![i as u8])).await.unwrap();
        assert_eq!(next_binary(client).await, vec![i as u8]);
    }

    // Act: close session #3
    let mut third = clients.remove(2);
    third.close(None).await.unwrap();
    let _ = timeout(WAIT, collect_until_close(&mut third)).await;

    // Assert: the rest still echo
    for (i, client) in clients.iter_mut().enumerate() {
        let payload = vec![0xA0 + i as u8; 16];
        client.send(WsMessage::Binary(payload.clone())).await.unwrap();
        assert_eq!(next_binary(client).await, payload);
    }
}

// ── Listener lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_clearing_running_flag_stops_accept_loop() {
    let relay = start_relay(closed_port().await).await;

    relay.running.store(false, Ordering::Relaxed);
    let result = timeout(WAIT, relay.task).await.expect("accept loop kept running");

    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_failed_handshake_does_not_stop_listener() {
    // Arrange
    let relay = start_relay(start_echo_backend().await).await;
    let addr = relay.url.trim_start_matches("ws://").to_string();

    // Act: a plain TCP client that speaks garbage instead of HTTP
    let mut raw = TcpStream::connect(addr.as_str()).await.unwrap();
    raw.write_all(b"not a websocket handshake\r\n\r\n").await.unwrap();
    drop(raw);

    // Assert: a real client still gets served
    let mut client = connect(&relay).await;
    client.send(WsMessage::Binary(vec![42])).await.unwrap();
    assert_eq!(next_binary(&mut client).await, vec![42]);
}
