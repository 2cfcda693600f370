//! Room metadata

use serde::{Deserialize, Serialize};

use crate::chat::MessageId;
use crate::types::Identity;

/// Rooms are addressed by the same opaque identifier type as users
pub type RoomId = Identity;

/// Metadata for a chat room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// A computer-friendly identifier
    pub id: RoomId,
    /// A human-friendly name
    pub name: String,
    /// Room participants, sorted and deduplicated. Participants cannot
    /// currently be added or removed after creation.
    pub participants: Vec<Identity>,
    /// Unread message counter, a convenience for front-ends
    pub unread: usize,
    /// Last known message in this room
    pub last_message: Option<MessageId>,
}

impl Room {
    /// Create room metadata from a participant set
    pub fn new(name: impl Into<String>, mut participants: Vec<Identity>) -> Self {
        participants.sort();
        participants.dedup();

        Self {
            id: RoomId::random(),
            name: name.into(),
            participants,
            unread: 0,
            last_message: None,
        }
    }

    /// Whether an identity participates in this room
    pub fn has_participant(&self, id: Identity) -> bool {
        self.participants.binary_search(&id).is_ok()
    }

    /// Whether this is a direct (2-party) room
    pub fn is_direct(&self) -> bool {
        self.participants.len() == 2
    }
}

/// Infer a room name from the labels of the remote participants
///
/// A 1-on-1 room takes the friend's label; a group room gets a name
/// joined from the first few labels.
pub(crate) fn infer_name(labels: &[String]) -> String {
    match labels {
        [] => "empty room".into(),
        [friend] => friend.clone(),
        _ => {
            let head = labels[..labels.len().min(3)].join(", ");
            if labels.len() > 3 {
                format!("{} +{}", head, labels.len() - 3)
            } else {
                head
            }
        }
    }
}
