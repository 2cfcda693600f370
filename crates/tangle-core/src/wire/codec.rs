//! Binary codec for frames and payloads
//!
//! Two encodings exist: the bare frame (stream transports, where the peer
//! is implicit in the connection) and the enveloped frame (the platform
//! link edge, where addressing metadata travels alongside the payload
//! bytes and flood is the `-1` sentinel).

use serde::{Deserialize, Serialize};

use crate::errors::{FrameError, Result, TangleError};
use crate::wire::{Frame, Neighbour, Payload};

/// Wire sentinel for [`Neighbour::Flood`]
const FLOOD_TARGET: i32 = -1;

/// Envelope used at the link-driver edge
#[derive(Serialize, Deserialize)]
struct Envelope {
    target: i32,
    frame: Frame,
}

/// Frame encoder/decoder with boundary validation
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// The maximum encoded frame size this codec accepts
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode a bare frame
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        let bytes = bincode::serialize(frame)?;
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    /// Decode a bare frame
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame> {
        self.check_input(bytes)?;
        bincode::deserialize(bytes).map_err(Into::into)
    }

    /// Encode a frame together with its link addressing
    pub fn encode_enveloped(&self, frame: &Frame, neighbour: Neighbour) -> Result<Vec<u8>> {
        let target = match neighbour {
            Neighbour::Flood => FLOOD_TARGET,
            Neighbour::Single(id) => id as i32,
        };
        let bytes = bincode::serialize(&Envelope {
            target,
            frame: frame.clone(),
        })?;
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    /// Decode an enveloped frame handed in by a link driver
    pub fn decode_enveloped(&self, bytes: &[u8]) -> Result<(Frame, Neighbour)> {
        self.check_input(bytes)?;
        let envelope: Envelope = bincode::deserialize(bytes)?;
        let neighbour = match envelope.target {
            FLOOD_TARGET => Neighbour::Flood,
            id if (0..=u16::MAX as i32).contains(&id) => Neighbour::Single(id as u16),
            bad => {
                return Err(TangleError::invalid_frame(format!(
                    "invalid neighbour target {bad}"
                )))
            }
        };
        Ok((envelope.frame, neighbour))
    }

    /// Encode a payload for embedding into a frame
    pub fn encode_payload(&self, payload: &Payload) -> Result<Vec<u8>> {
        let bytes = bincode::serialize(payload)?;
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    /// Decode the payload carried by a frame
    pub fn decode_payload(&self, frame: &Frame) -> Result<Payload> {
        self.check_input(&frame.payload)?;
        bincode::deserialize(&frame.payload).map_err(Into::into)
    }

    fn check_input(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(TangleError::Frame(FrameError::Empty));
        }
        self.check_size(bytes.len())
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_frame_size {
            return Err(TangleError::Frame(FrameError::TooLarge {
                size,
                max_size: self.max_frame_size,
            }));
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(crate::SessionConfig::default().max_frame_size)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
