//! Session configuration
//!
//! Consolidates the tunables used by the stores and the runtime into a
//! single configuration structure with sensible defaults.

use serde::{Deserialize, Serialize};

/// Configuration for a Tangle session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// TCP port the session listens on
    pub port: u16,
    /// Depth of the link endpoint's inbound/outbound frame queues
    pub queue_depth: usize,
    /// Maximum size of an encoded frame in bytes
    pub max_frame_size: usize,
    /// Maximum chat message content length in characters
    pub max_content_length: usize,
    /// Maximum number of stored messages per room
    pub max_messages_per_room: usize,
    /// Interval between profile re-announcements, in seconds
    pub announce_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: 9001,
            queue_depth: 64,
            max_frame_size: 64 * 1024,
            max_content_length: 4096,
            max_messages_per_room: 10_000,
            announce_interval_secs: 30,
        }
    }
}

impl SessionConfig {
    /// Create a configuration bound to a specific port
    pub fn for_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Create a configuration suited for tests: ephemeral port, small
    /// queues, fast re-announcement
    pub fn testing() -> Self {
        Self {
            port: 0,
            queue_depth: 16,
            max_frame_size: 16 * 1024,
            max_content_length: 1024,
            max_messages_per_room: 100,
            announce_interval_secs: 1,
        }
    }
}
