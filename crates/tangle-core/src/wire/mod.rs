//! Frame wire format
//!
//! Frames are the opaque transport unit exchanged with platform link
//! drivers and TCP peers: a sender identity, a sequence number, an
//! optional signature, and an encoded [`Payload`]. The codec is bincode
//! with size and shape validation at the boundary.

mod codec;
mod frame;

pub use codec::FrameCodec;
pub use frame::{Frame, Neighbour, Payload};
