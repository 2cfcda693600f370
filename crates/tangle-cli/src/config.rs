//! Tangle CLI configuration
//!
//! Loaded from a `tangle.toml` file when one is given on the command
//! line; every section falls back to defaults, so a partial file (or no
//! file at all) is fine. The `--port` and `--connect` flags override
//! whatever the file says.

use std::fs;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use tangle_core::SessionConfig;

/// Complete configuration for the tangle CLI node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Engine settings
    pub session: SessionSettings,
    /// Local identity settings
    pub identity: IdentitySettings,
    /// Peers to dial on startup (host:port)
    pub peers: Vec<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config file {path}"))
    }
}

/// Engine settings, mirroring [`SessionConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub port: u16,
    pub queue_depth: usize,
    pub max_frame_size: usize,
    pub max_content_length: usize,
    pub max_messages_per_room: usize,
    pub announce_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let config = SessionConfig::default();
        Self {
            port: config.port,
            queue_depth: config.queue_depth,
            max_frame_size: config.max_frame_size,
            max_content_length: config.max_content_length,
            max_messages_per_room: config.max_messages_per_room,
            announce_interval_secs: config.announce_interval_secs,
        }
    }
}

impl SessionSettings {
    /// Build the engine config, applying an optional port override
    pub fn session_config(&self, port_override: Option<u16>) -> SessionConfig {
        SessionConfig {
            port: port_override.unwrap_or(self.port),
            queue_depth: self.queue_depth,
            max_frame_size: self.max_frame_size,
            max_content_length: self.max_content_length,
            max_messages_per_room: self.max_messages_per_room,
            announce_interval_secs: self.announce_interval_secs,
        }
    }
}

/// Local identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Handle announced to peers, e.g. `@alice`
    pub handle: Option<String>,
    /// Credential for the node-local user
    pub password: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            handle: None,
            password: "tangle".into(),
        }
    }
}
