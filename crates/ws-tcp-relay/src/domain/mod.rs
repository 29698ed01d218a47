//! Domain layer for ws-tcp-relay.
//!
//! Pure types with no dependencies on I/O, sockets, or the async runtime:
//! the relay configuration, the session state machine, and the outcome
//! records produced by the copy loops.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod session;

pub use config::{InvalidConfig, RelayConfig};
pub use session::{
    Direction, LoopOutcome, PumpOutcome, SessionError, SessionId, SessionLifecycle, SessionState,
    TerminationReason,
};
