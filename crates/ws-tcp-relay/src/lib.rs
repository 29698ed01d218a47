//! ws-tcp-relay library crate.
//!
//! A transparent relay between WebSocket clients and a single TCP backend.
//! Every accepted client gets its own backend connection; bytes are copied
//! unmodified in both directions until either side goes away, and then both
//! sides are closed together.
//!
//! # Architecture
//!
//! ```text
//! Client (binary frames over WebSocket)
//!         ↕
//! [ws-tcp-relay]
//!   ├── domain/           RelayConfig, session state machine, loop outcomes
//!   ├── application/      Transport trait, duplex pump, session manager
//!   └── infrastructure/
//!         ├── ws_server/    accept loop + WebSocket upgrade
//!         ├── ws_endpoint/  Transport over tokio-tungstenite
//!         ├── tcp_endpoint/ Transport over tokio TcpStream, TCP dialer
//!         └── config_file/  TOML loading
//!         ↕
//! Backend (raw TCP)
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O.
//! - `application` depends on `domain` and reaches I/O only through traits.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: the relay session lifecycle.
pub mod application;

/// Infrastructure layer: WebSocket server, TCP backend, config file.
pub mod infrastructure;
