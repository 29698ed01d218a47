//! Infrastructure layer for ws-tcp-relay.
//!
//! The infrastructure layer handles all I/O: accepting WebSocket connections
//! from clients, opening TCP connections to the backend, and loading the
//! configuration file.
//!
//! # Responsibilities
//!
//! - Binding the listener and performing the WebSocket upgrade handshake
//! - Implementing [`Transport`](crate::application::Transport) for WebSocket
//!   and TCP connections
//! - Dialing the backend
//! - Reading the TOML configuration file
//! - Handling the graceful shutdown signal

pub mod config_file;
pub mod tcp_endpoint;
pub mod ws_endpoint;
pub mod ws_server;

pub use config_file::{load_config, ConfigError};
pub use tcp_endpoint::{TcpDialer, TcpEndpoint};
pub use ws_endpoint::WsEndpoint;
pub use ws_server::{run_listener, run_server};
