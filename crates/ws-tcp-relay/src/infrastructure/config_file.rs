//! TOML configuration file loading.
//!
//! The file is optional; when given, it replaces the built-in defaults field by
//! field, and CLI flags are applied on top afterwards (see `main.rs`).  Values
//! are not validated here: a flag may still fix a bad file value, so callers
//! run [`RelayConfig::validate`] on the merged result.
//!
//! ```toml
//! listen_host = "0.0.0.0"
//! listen_port = 7004
//! backend_host = "10.0.0.8"
//! backend_port = 46732
//! connect_timeout_secs = 30
//! read_buffer_size = 102400
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::config::RelayConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parses TOML text; missing fields take their defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML or wrongly typed fields.
pub fn parse_config(text: &str) -> Result<RelayConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
/// errors of [`parse_config`].
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
