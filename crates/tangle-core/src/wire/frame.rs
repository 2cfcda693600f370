//! Frame and payload types

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, Room};
use crate::types::Identity;
use crate::users::UserProfile;

// ----------------------------------------------------------------------------
// Neighbour Addressing
// ----------------------------------------------------------------------------

/// Link-local addressing for a frame
///
/// `Single` carries the driver-scoped neighbour id of one peer on the
/// local link; `Flood` addresses every reachable neighbour. On the wire
/// flood is the `-1` sentinel (see the codec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Neighbour {
    /// Deliver to all neighbours
    Flood,
    /// Deliver to a single neighbour
    Single(u16),
}

// ----------------------------------------------------------------------------
// Payload
// ----------------------------------------------------------------------------

/// The in-band protocol carried inside frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// A user announcing (or re-announcing) their profile
    Announce(UserProfile),
    /// A peer created a room that includes us
    RoomCreate(Room),
    /// A chat message for a room
    Chat(ChatMessage),
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// A transport-layer unit exchanged with peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Originating user identity
    pub sender: Identity,
    /// Per-sender sequence number, used for duplicate suppression
    pub seq: u64,
    /// Encoded [`Payload`]
    pub payload: Vec<u8>,
    /// Optional ed25519 signature over seq and payload
    #[serde(with = "signature_serde")]
    pub signature: Option<[u8; 64]>,
}

impl Frame {
    /// Create an unsigned frame
    pub fn new(sender: Identity, seq: u64, payload: Vec<u8>) -> Self {
        Self {
            sender,
            seq,
            payload,
            signature: None,
        }
    }

    /// Attach a signature
    pub fn with_signature(mut self, signature: [u8; 64]) -> Self {
        self.signature = Some(signature);
        self
    }

    /// The bytes a signature covers: sequence number then payload
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.payload.len());
        bytes.extend_from_slice(&self.seq.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Verify the signature against the sender identity
    ///
    /// Unsigned frames verify trivially; a present signature must check
    /// out against the sender's key bytes.
    pub fn verify_signature(&self) -> bool {
        let Some(sig_bytes) = self.signature else {
            return true;
        };
        let Ok(key) = VerifyingKey::from_bytes(self.sender.as_bytes()) else {
            return false;
        };
        let signature = Signature::from_bytes(&sig_bytes);
        key.verify(&self.signable_bytes(), &signature).is_ok()
    }
}

// ----------------------------------------------------------------------------
// Custom Serde for large arrays
// ----------------------------------------------------------------------------

mod signature_serde {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 64]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(array) => serializer.serialize_some(&array[..]),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 64]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::Deserialize;

        let opt_vec: Option<Vec<u8>> = Option::deserialize(deserializer)?;
        match opt_vec {
            Some(vec) => {
                if vec.len() == 64 {
                    let mut array = [0u8; 64];
                    array.copy_from_slice(&vec);
                    Ok(Some(array))
                } else {
                    Err(serde::de::Error::invalid_length(vec.len(), &"64 bytes"))
                }
            }
            None => Ok(None),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
