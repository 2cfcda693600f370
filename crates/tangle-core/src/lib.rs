//! Tangle Core
//!
//! This crate provides the foundational types for the Tangle peer-to-peer
//! chat engine: identifiers and timestamps, user profiles and credentials,
//! chat rooms and messages, and the frame wire format exchanged with
//! transport drivers. It contains no I/O; the engine lives in
//! `tangle-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod chat;
pub mod config;
pub mod errors;
pub mod types;
pub mod users;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use chat::{ChatMessage, ChatStore, MessageId, Room, RoomId};
pub use config::SessionConfig;
pub use errors::{AuthError, FrameError, Result, RoomError, TangleError, TransportError};
pub use types::{Identity, Timestamp};
pub use users::{AuthToken, ItemDiff, UserAuth, UserProfile, UserStore, UserUpdate};
pub use wire::{Frame, FrameCodec, Neighbour, Payload};
