//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! It is passed explicitly to the session manager and the listener, so several
//! independently configured relays can run in one process (tests do exactly
//! that, each against its own ephemeral backend).
//!
//! The infrastructure layer populates the struct from an optional TOML file and
//! then applies CLI/environment overrides on top.  Every field carries a serde
//! default, so a partial file only needs to mention what it changes:
//!
//! ```toml
//! backend_host = "127.0.0.1"
//! backend_port = 9000
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// A configuration value that passed parsing but makes no sense at runtime.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("backend_port must be non-zero")]
    ZeroBackendPort,

    #[error("connect_timeout_secs must be at least 1")]
    ZeroConnectTimeout,

    #[error("read_buffer_size must be at least 1 byte")]
    ZeroReadBuffer,

    #[error("{field} must not be empty")]
    EmptyHost { field: &'static str },
}

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use ws_tcp_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.listen_port, 7004);
/// assert_eq!(cfg.backend_port, 46732);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// Host name or IP the WebSocket listener binds to.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Port the WebSocket listener binds to.  `0` asks the OS for a free port.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Host name or IP of the TCP backend every session is relayed to.
    #[serde(default = "default_backend_host")]
    pub backend_host: String,

    /// TCP port of the backend.
    #[serde(default = "default_backend_port")]
    pub backend_port: u16,

    /// Upper bound on the backend dial, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Size of the buffer used for each read from the backend socket.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_host() -> String {
    "localhost".to_string()
}
fn default_listen_port() -> u16 {
    7004
}
fn default_backend_host() -> String {
    "45.137.190.200".to_string()
}
fn default_backend_port() -> u16 {
    46732
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_read_buffer_size() -> usize {
    102_400
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RelayConfig {
    /// | Field                | Default            |
    /// |----------------------|--------------------|
    /// | listen_host          | `localhost`        |
    /// | listen_port          | `7004`             |
    /// | backend_host         | `45.137.190.200`   |
    /// | backend_port         | `46732`            |
    /// | connect_timeout_secs | `30`               |
    /// | read_buffer_size     | `102400`           |
    /// | log_level            | `info`             |
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            backend_host: default_backend_host(),
            backend_port: default_backend_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_buffer_size: default_read_buffer_size(),
            log_level: default_log_level(),
        }
    }
}

impl RelayConfig {
    /// Checks the values that deserialization alone cannot reject.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidConfig`] found.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.listen_host.trim().is_empty() {
            return Err(InvalidConfig::EmptyHost {
                field: "listen_host",
            });
        }
        if self.backend_host.trim().is_empty() {
            return Err(InvalidConfig::EmptyHost {
                field: "backend_host",
            });
        }
        if self.backend_port == 0 {
            return Err(InvalidConfig::ZeroBackendPort);
        }
        if self.connect_timeout_secs == 0 {
            return Err(InvalidConfig::ZeroConnectTimeout);
        }
        if self.read_buffer_size == 0 {
            return Err(InvalidConfig::ZeroReadBuffer);
        }
        Ok(())
    }

    /// The backend dial bound as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `host:port` of the backend, for dialing and log messages.
    pub fn backend_addr(&self) -> String {
        format!("{}:{}", self.backend_host, self.backend_port)
    }

    /// `host:port` of the WebSocket listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
