//! Chat rooms and messages
//!
//! A room is a named set of participants with a stable identity; direct
//! (2-party) and group chats are the same thing with different set sizes.
//! Messages are content-addressed so retransmissions deduplicate and
//! tampering is detectable.

mod message;
mod room;
mod store;

pub use message::{ChatMessage, MessageId};
pub use room::{Room, RoomId};
pub use store::ChatStore;
