//! Session lifecycle and copy-loop outcome types.
//!
//! A session moves through a small, strictly forward state machine:
//!
//! ```text
//! Connecting ──dial ok──▶ Active ──pump joined──▶ Closing ──endpoints closed──▶ Closed
//!     │
//!     └──dial failed / timed out────────────────────────────────────────────────▶ Closed
//! ```
//!
//! Nothing here performs I/O; the application layer drives the transitions.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for one relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first block of the UUID is enough to tell sessions apart in logs.
        let full = self.0.to_string();
        f.write_str(&full[..8])
    }
}

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Dialing the backend.
    Connecting,
    /// Both copy loops are running.
    Active,
    /// Both copy loops have been joined; the endpoints are being closed.
    Closing,
    /// Both endpoints closed.  Terminal.
    Closed,
}

impl SessionState {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Connecting, SessionState::Active)
                | (SessionState::Connecting, SessionState::Closed)
                | (SessionState::Active, SessionState::Closing)
                | (SessionState::Closing, SessionState::Closed)
        )
    }
}

/// An attempt to move a session backwards or skip a state.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal session transition {from:?} -> {to:?}")]
pub struct SessionError {
    pub from: SessionState,
    pub to: SessionState,
}

/// Tracks the state of a single session and enforces the transition rules.
#[derive(Debug)]
pub struct SessionLifecycle {
    state: SessionState,
}

impl SessionLifecycle {
    /// A new session starts in [`SessionState::Connecting`].
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] and leaves the state unchanged if the
    /// transition is not allowed.
    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Which way a copy loop moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToBackend => f.write_str("client->backend"),
            Direction::BackendToClient => f.write_str("backend->client"),
        }
    }
}

/// Why a copy loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The source reported end-of-stream, or the sibling loop shut the
    /// session down.
    PeerClosed,
    /// Forwarding failed on our side: the destination rejected a send, or the
    /// loop task itself died.
    LocalError,
    /// The source endpoint failed while receiving.
    RemoteError,
}

impl TerminationReason {
    /// `true` for the two error reasons.
    pub fn is_error(self) -> bool {
        !matches!(self, TerminationReason::PeerClosed)
    }
}

/// Result of one directional copy loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub direction: Direction,
    pub bytes_transferred: u64,
    pub chunks_transferred: u64,
    pub reason: TerminationReason,
}

/// The outcomes of both copy loops of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    pub client_to_backend: LoopOutcome,
    pub backend_to_client: LoopOutcome,
}

impl PumpOutcome {
    /// `true` if neither loop ended with an error.
    pub fn is_clean(&self) -> bool {
        !self.client_to_backend.reason.is_error() && !self.backend_to_client.reason.is_error()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
