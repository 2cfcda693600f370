//! Tangle Runtime Engine
//!
//! This crate contains the engine behind the Tangle chat protocol:
//! - [`Session`]: an owned session bound to a listening port; all user,
//!   room, messaging and transport operations hang off it
//! - [`Endpoint`]: the seam between the frame router and concrete
//!   transports
//! - [`LinkEndpoint`]: the push/pull integration point for platform
//!   link drivers (local wireless and similar)
//! - [`TcpEndpoint`]: length-prefixed frame exchange with TCP peers
//!
//! `tangle-core` provides the types; this crate makes them move.

mod endpoint;
mod handlers;
mod link;
mod router;
mod session;
mod tcp;

pub use endpoint::Endpoint;
pub use link::LinkEndpoint;
pub use router::Router;
pub use session::Session;
pub use tcp::TcpEndpoint;

// Re-export core types for convenience
pub use tangle_core::{
    ChatMessage, Frame, FrameCodec, Identity, MessageId, Neighbour, Payload, Result, Room, RoomId,
    SessionConfig, TangleError, Timestamp, UserAuth, UserProfile, UserUpdate,
};
