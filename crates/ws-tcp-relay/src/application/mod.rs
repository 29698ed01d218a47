//! Application layer for ws-tcp-relay.
//!
//! The application layer knows *what* a relay session does: pump bytes both
//! ways, tear down together, contain every failure.  It talks to the outside
//! world only through the [`Transport`] and [`BackendDialer`] traits, so the
//! whole session lifecycle is testable with [`mock::MockEndpoint`].
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod mock;
pub mod pump;
pub mod session_manager;
pub mod transport;

pub use pump::run_pump;
pub use session_manager::{BackendDialer, RelayError, SessionManager, SessionReport};
pub use transport::{Received, Transport, TransportError};
