//! Content-addressed chat messages

use core::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chat::RoomId;
use crate::types::{Identity, Timestamp};

// ----------------------------------------------------------------------------
// Message Id
// ----------------------------------------------------------------------------

/// Cryptographic identifier for a chat message
///
/// The id is the SHA-256 over the message fields, so it doubles as an
/// integrity proof and makes redelivered messages deduplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId([u8; 32]);

impl MessageId {
    /// Create a MessageId from hash bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ----------------------------------------------------------------------------
// Chat Message
// ----------------------------------------------------------------------------

/// An authored message in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Content-addressed identity
    pub id: MessageId,
    /// Sender identity
    pub sender: Identity,
    /// The room this message belongs to
    pub room: RoomId,
    /// When the message was authored (sender clock, utc millis)
    pub timestamp: Timestamp,
    /// Text payload
    pub content: String,
}

impl ChatMessage {
    /// Author a new message now
    pub fn new(sender: Identity, room: RoomId, content: impl Into<String>) -> Self {
        let content = content.into();
        let timestamp = Timestamp::now();
        let id = Self::compute_id(&sender, &room, timestamp, &content);

        Self {
            id,
            sender,
            room,
            timestamp,
            content,
        }
    }

    fn compute_id(
        sender: &Identity,
        room: &RoomId,
        timestamp: Timestamp,
        content: &str,
    ) -> MessageId {
        let mut hasher = Sha256::new();
        hasher.update(sender.as_bytes());
        hasher.update(room.as_bytes());
        hasher.update(timestamp.as_millis().to_be_bytes());
        hasher.update(content.as_bytes());
        MessageId::from_bytes(hasher.finalize().into())
    }

    /// Verify the id still matches the message fields
    pub fn verify_integrity(&self) -> bool {
        Self::compute_id(&self.sender, &self.room, self.timestamp, &self.content) == self.id
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
