//! In-memory room and message store with deduplication

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::chat::{room, ChatMessage, MessageId, Room, RoomId};
use crate::config::SessionConfig;
use crate::errors::{Result, RoomError, TangleError};
use crate::types::Identity;

/// In-memory store of rooms and their messages
pub struct ChatStore {
    rooms: HashMap<RoomId, Room>,
    /// Sorted participant set -> room, for duplicate detection
    by_participants: HashMap<Vec<Identity>, RoomId>,
    messages: HashMap<RoomId, Vec<ChatMessage>>,
    seen: HashSet<MessageId>,
    max_content_length: usize,
    max_messages_per_room: usize,
}

impl ChatStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            by_participants: HashMap::new(),
            messages: HashMap::new(),
            seen: HashSet::new(),
            max_content_length: config.max_content_length,
            max_messages_per_room: config.max_messages_per_room,
        }
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// List all known rooms
    pub fn rooms(&self) -> Vec<Room> {
        self.rooms.values().cloned().collect()
    }

    /// Get a room by id
    pub fn room(&self, id: RoomId) -> Result<Room> {
        self.rooms
            .get(&id)
            .cloned()
            .ok_or_else(|| TangleError::room_not_found(id))
    }

    /// Create a new room for the creator and a set of friends
    ///
    /// When no name is given one is inferred from the friends' labels via
    /// `label`. Creating a room whose exact participant set already
    /// exists is an error carrying the existing room's id.
    pub fn create_room<F>(
        &mut self,
        creator: Identity,
        friends: Vec<Identity>,
        name: Option<String>,
        label: F,
    ) -> Result<Room>
    where
        F: Fn(Identity) -> String,
    {
        let mut participants: Vec<Identity> = friends;
        participants.retain(|id| *id != creator);
        if participants.is_empty() {
            return Err(TangleError::Room(RoomError::NoParticipants));
        }

        let friend_labels: Vec<String> = {
            let mut sorted = participants.clone();
            sorted.sort();
            sorted.dedup();
            sorted.iter().map(|id| label(*id)).collect()
        };

        participants.push(creator);
        let room = Room::new(
            name.unwrap_or_else(|| room::infer_name(&friend_labels)),
            participants,
        );

        if let Some(existing) = self.by_participants.get(&room.participants) {
            return Err(TangleError::Room(RoomError::Duplicate {
                id: existing.to_string(),
            }));
        }

        self.by_participants
            .insert(room.participants.clone(), room.id);
        self.rooms.insert(room.id, room.clone());
        debug!(room = %room.id, name = %room.name, "created room");
        Ok(room)
    }

    /// Record a room created by a peer
    ///
    /// Returns false when the room (or its participant set) is already
    /// known.
    pub fn insert_remote_room(&mut self, room: Room) -> bool {
        if self.rooms.contains_key(&room.id)
            || self.by_participants.contains_key(&room.participants)
        {
            return false;
        }

        debug!(room = %room.id, name = %room.name, "remote room");
        self.by_participants
            .insert(room.participants.clone(), room.id);
        self.rooms.insert(room.id, room);
        true
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(TangleError::Room(RoomError::InvalidMessage {
                reason: "empty content".into(),
            }));
        }
        if content.chars().count() > self.max_content_length {
            return Err(TangleError::Room(RoomError::InvalidMessage {
                reason: format!("content exceeds {} characters", self.max_content_length),
            }));
        }
        if content.contains('\0') {
            return Err(TangleError::Room(RoomError::InvalidMessage {
                reason: "content contains null bytes".into(),
            }));
        }
        Ok(())
    }

    fn check_capacity(&self, room: RoomId) -> Result<()> {
        let count = self.messages.get(&room).map(Vec::len).unwrap_or(0);
        if count >= self.max_messages_per_room {
            return Err(TangleError::Room(RoomError::InvalidMessage {
                reason: format!("room at capacity of {} messages", self.max_messages_per_room),
            }));
        }
        Ok(())
    }

    /// Author and store a message from a local sender
    pub fn send_message(
        &mut self,
        sender: Identity,
        room_id: RoomId,
        content: impl Into<String>,
    ) -> Result<ChatMessage> {
        let content = content.into();
        self.validate_content(&content)?;

        let room = self
            .rooms
            .get(&room_id)
            .ok_or_else(|| TangleError::room_not_found(room_id))?;
        if !room.has_participant(sender) {
            return Err(TangleError::not_a_participant(sender, room_id));
        }
        self.check_capacity(room_id)?;

        let message = ChatMessage::new(sender, room_id, content);
        self.seen.insert(message.id);
        self.messages
            .entry(room_id)
            .or_default()
            .push(message.clone());

        // The author has read their own message, so only last_message moves
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.last_message = Some(message.id);
        }
        Ok(message)
    }

    /// Store a message received from a peer
    ///
    /// Returns false when the message was already known. Remote messages
    /// bump the room's unread counter.
    pub fn store_remote(&mut self, message: ChatMessage) -> Result<bool> {
        if self.seen.contains(&message.id) {
            return Ok(false);
        }
        if !message.verify_integrity() {
            return Err(TangleError::Room(RoomError::InvalidMessage {
                reason: "message id does not match content".into(),
            }));
        }
        self.validate_content(&message.content)?;

        let room = self
            .rooms
            .get(&message.room)
            .ok_or_else(|| TangleError::room_not_found(message.room))?;
        if !room.has_participant(message.sender) {
            return Err(TangleError::not_a_participant(message.sender, message.room));
        }
        self.check_capacity(message.room)?;

        self.seen.insert(message.id);
        if let Some(room) = self.rooms.get_mut(&message.room) {
            room.unread += 1;
            room.last_message = Some(message.id);
        }
        self.messages
            .entry(message.room)
            .or_default()
            .push(message);
        Ok(true)
    }

    /// Load all messages of a room for a participant, ordered by
    /// timestamp (then id for ties), clearing the unread counter
    pub fn load_messages(&mut self, reader: Identity, room_id: RoomId) -> Result<Vec<ChatMessage>> {
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| TangleError::room_not_found(room_id))?;
        if !room.has_participant(reader) {
            return Err(TangleError::not_a_participant(reader, room_id));
        }
        room.unread = 0;

        let mut messages = self.messages.get(&room_id).cloned().unwrap_or_default();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(messages)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
