//! Inbound frame handling
//!
//! Every frame an endpoint pulls in goes through [`handle_frame`]:
//! duplicate suppression, signature verification, then payload dispatch
//! into the stores. Bad frames are logged and dropped; a misbehaving
//! peer must never take the engine down.

use tracing::{debug, trace, warn};

use tangle_core::{Frame, Payload};

use crate::session::SessionState;

pub(crate) async fn handle_frame(state: &SessionState, frame: Frame) {
    // Our own frames can echo back over the link; ignore them
    if state.users.read().await.is_local(frame.sender) {
        return;
    }

    if !state.ledger.lock().await.witness(frame.sender, frame.seq) {
        trace!(sender = %frame.sender, seq = frame.seq, "duplicate frame dropped");
        return;
    }

    if !frame.verify_signature() {
        warn!(sender = %frame.sender, seq = frame.seq, "bad frame signature");
        return;
    }

    let payload = match state.codec.decode_payload(&frame) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(sender = %frame.sender, %err, "undecodable payload");
            return;
        }
    };

    match payload {
        Payload::Announce(profile) => {
            // A peer may only announce their own profile
            if profile.id != frame.sender {
                warn!(sender = %frame.sender, claimed = %profile.id, "spoofed announce");
                return;
            }
            state.users.write().await.upsert_remote(profile);
        }

        Payload::RoomCreate(room) => {
            if !room.has_participant(frame.sender) {
                warn!(sender = %frame.sender, room = %room.id, "room create from non-participant");
                return;
            }
            let inserted = state.chat.write().await.insert_remote_room(room);
            if inserted {
                debug!(sender = %frame.sender, "room learned from peer");
            }
        }

        Payload::Chat(message) => {
            if message.sender != frame.sender {
                warn!(sender = %frame.sender, claimed = %message.sender, "spoofed message sender");
                return;
            }
            match state.chat.write().await.store_remote(message) {
                Ok(true) => {}
                Ok(false) => trace!(sender = %frame.sender, "duplicate message"),
                Err(err) => warn!(sender = %frame.sender, %err, "message rejected"),
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use tangle_core::{Identity, Room, SessionConfig, UserProfile};

    fn state() -> SessionState {
        SessionState::new(&SessionConfig::testing())
    }

    fn announce_frame(state: &SessionState, profile: &UserProfile, seq: u64) -> Frame {
        let payload = state
            .codec
            .encode_payload(&Payload::Announce(profile.clone()))
            .unwrap();
        Frame::new(profile.id, seq, payload)
    }

    #[tokio::test]
    async fn test_announce_upserts_remote_profile() {
        let state = state();
        let mut profile = UserProfile::new(Identity::new([4u8; 32]));
        profile.display_name = Some("Bob".into());

        handle_frame(&state, announce_frame(&state, &profile, 0)).await;

        let remote = state.users.read().await.list_remote();
        assert_eq!(remote, vec![profile]);
    }

    #[tokio::test]
    async fn test_spoofed_announce_dropped() {
        let state = state();
        let profile = UserProfile::new(Identity::new([4u8; 32]));

        let payload = state
            .codec
            .encode_payload(&Payload::Announce(profile))
            .unwrap();
        // Frame sender differs from the announced identity
        let frame = Frame::new(Identity::new([5u8; 32]), 0, payload);
        handle_frame(&state, frame).await;

        assert!(state.users.read().await.list_remote().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_frames_processed_once() {
        let state = state();
        let sender = Identity::new([4u8; 32]);
        let room = Room::new("r", vec![sender, Identity::new([5u8; 32])]);

        let payload = state
            .codec
            .encode_payload(&Payload::RoomCreate(room.clone()))
            .unwrap();
        let frame = Frame::new(sender, 1, payload);

        handle_frame(&state, frame.clone()).await;
        assert!(state.chat.read().await.room(room.id).is_ok());

        // Redelivery of the same (sender, seq) is ignored even for
        // otherwise-new content
        handle_frame(&state, frame).await;
        assert_eq!(state.chat.read().await.rooms().len(), 1);
    }

    #[tokio::test]
    async fn test_room_create_requires_membership() {
        let state = state();
        let outsider = Identity::new([9u8; 32]);
        let room = Room::new("r", vec![Identity::new([1u8; 32]), Identity::new([2u8; 32])]);

        let payload = state
            .codec
            .encode_payload(&Payload::RoomCreate(room.clone()))
            .unwrap();
        handle_frame(&state, Frame::new(outsider, 0, payload)).await;

        assert!(state.chat.read().await.room(room.id).is_err());
    }

    #[tokio::test]
    async fn test_garbage_payload_is_survivable() {
        let state = state();
        let frame = Frame::new(Identity::new([1u8; 32]), 0, b"garbage".to_vec());
        handle_frame(&state, frame).await;
        assert!(state.users.read().await.list_remote().is_empty());
    }
}
