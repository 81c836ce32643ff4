//! # Configuration
//!
//! Server and client settings, loaded once at startup from TOML.
//!
//! ```toml
//! port = 7777
//! max_peers = 8
//! listen = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};

/// Largest supported peer count; the max-peer-index travels as one byte.
pub const MAX_PEERS: u16 = 256;

/// Default session port.
pub const DEFAULT_PORT: u16 = 7777;

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Maximum simultaneous peers, local peer included (1..=256).
    pub max_peers: u16,
    /// Whether this server also hosts a local peer (takes ID 0).
    pub listen: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_peers: 16,
            listen: false,
        }
    }
}

impl ServerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`NetError::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> NetResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| NetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`NetError::Io`] if the file cannot be read, otherwise as
    /// [`ServerConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks that `max_peers` is within 1..=256.
    ///
    /// # Errors
    ///
    /// [`NetError::Config`] otherwise.
    pub fn validate(&self) -> NetResult<()> {
        if self.max_peers == 0 || self.max_peers > MAX_PEERS {
            return Err(NetError::Config(format!(
                "max_peers must be within 1..={MAX_PEERS}, got {}",
                self.max_peers
            )));
        }
        Ok(())
    }

    /// Highest assignable peer ID.
    #[inline]
    #[must_use]
    pub const fn max_peer_index(&self) -> u8 {
        self.max_peers.saturating_sub(1) as u8
    }
}

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address.
    pub address: String,
    /// Server port.
    pub port: u16,
    /// Directory holding synced files. In-memory storage when unset.
    pub file_root: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            file_root: None,
        }
    }
}

impl ClientConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`NetError::Config`] on malformed TOML.
    pub fn from_toml_str(text: &str) -> NetResult<Self> {
        toml::from_str(text).map_err(|e| NetError::Config(e.to_string()))
    }

    /// Loads a TOML file.
    ///
    /// # Errors
    ///
    /// [`NetError::Io`] if the file cannot be read, otherwise as
    /// [`ClientConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
