//! ws-tcp-relay entry point.
//!
//! Accepts WebSocket connections and relays each one, byte for byte, to a
//! fixed TCP backend.
//!
//! # Usage
//!
//! ```text
//! ws-tcp-relay [OPTIONS]
//!
//! Options:
//!   --config           <PATH>   TOML config file
//!   --listen-host      <HOST>   WebSocket bind host [default: localhost]
//!   --listen-port      <PORT>   WebSocket bind port [default: 7004]
//!   --backend-host     <HOST>   Backend host [default: 45.137.190.200]
//!   --backend-port     <PORT>   Backend port [default: 46732]
//!   --connect-timeout  <SECS>   Backend dial timeout [default: 30]
//!   --read-buffer-size <BYTES>  Backend read size [default: 102400]
//!   --log-level        <LEVEL>  Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! Precedence, lowest first: built-in defaults, `--config` file, flags /
//! environment variables.
//!
//! | Variable                 | Flag                 |
//! |--------------------------|----------------------|
//! | `RELAY_CONFIG`           | `--config`           |
//! | `RELAY_LISTEN_HOST`      | `--listen-host`      |
//! | `RELAY_LISTEN_PORT`      | `--listen-port`      |
//! | `RELAY_BACKEND_HOST`     | `--backend-host`     |
//! | `RELAY_BACKEND_PORT`     | `--backend-port`     |
//! | `RELAY_CONNECT_TIMEOUT`  | `--connect-timeout`  |
//! | `RELAY_READ_BUFFER_SIZE` | `--read-buffer-size` |
//! | `RELAY_LOG_LEVEL`        | `--log-level`        |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ws_tcp_relay::domain::RelayConfig;
use ws_tcp_relay::infrastructure::{load_config, run_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Transparent WebSocket-to-TCP relay.
///
/// Every flag is optional; unset flags fall back to the config file, then to
/// the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "ws-tcp-relay",
    about = "Relays WebSocket clients to a TCP backend, byte for byte",
    version
)]
struct Cli {
    /// TOML file with relay settings.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Host or IP the WebSocket listener binds to.
    #[arg(long, env = "RELAY_LISTEN_HOST")]
    listen_host: Option<String>,

    /// Port the WebSocket listener binds to.
    #[arg(long, env = "RELAY_LISTEN_PORT")]
    listen_port: Option<u16>,

    /// Host or IP of the TCP backend.
    #[arg(long, env = "RELAY_BACKEND_HOST")]
    backend_host: Option<String>,

    /// Port of the TCP backend.
    #[arg(long, env = "RELAY_BACKEND_PORT")]
    backend_port: Option<u16>,

    /// Seconds to wait for the backend connection before giving up.
    #[arg(long, env = "RELAY_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Maximum bytes per read from the backend.
    #[arg(long, env = "RELAY_READ_BUFFER_SIZE")]
    read_buffer_size: Option<usize>,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[arg(long, env = "RELAY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Builds the effective [`RelayConfig`]: defaults, then the config file,
    /// then any flags that were given.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the merged
    /// configuration fails validation.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if let Some(host) = self.listen_host {
            config.listen_host = host;
        }
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(host) = self.backend_host {
            config.backend_host = host;
        }
        if let Some(port) = self.backend_port {
            config.backend_port = port;
        }
        if let Some(secs) = self.connect_timeout {
            config.connect_timeout_secs = secs;
        }
        if let Some(size) = self.read_buffer_size {
            config.read_buffer_size = size;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.validate().context("invalid relay configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_relay_config()?;

    // `RUST_LOG` wins; otherwise use the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "ws-tcp-relay starting: listen={}, backend={}, connect_timeout={}s",
        config.listen_addr(),
        config.backend_addr(),
        config.connect_timeout_secs
    );

    // Cleared by Ctrl+C; the accept loop polls it and exits cleanly.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("ws-tcp-relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
