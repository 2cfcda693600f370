//! End-to-end session tests
//!
//! Two engines are brought up and bridged either through their platform
//! link endpoints (a pair of pump tasks shuttling encoded frames, the way
//! a link driver would) or over TCP, and the full announce / room /
//! message flow is exercised across the bridge.

use std::sync::Arc;
use std::time::Duration;

use tangle_runtime::{
    Frame, FrameCodec, Identity, LinkEndpoint, Neighbour, Payload, Room, Session, SessionConfig,
    TangleError, UserProfile, UserUpdate,
};

/// Bridge two sessions link-to-link, as a platform driver would
fn bridge(a: Arc<LinkEndpoint>, b: Arc<LinkEndpoint>) {
    for (from, to) in [(a.clone(), b.clone()), (b, a)] {
        tokio::spawn(async move {
            while let Ok(bytes) = from.take_encoded().await {
                if to.give(&bytes).await.is_err() {
                    break;
                }
            }
        });
    }
}

/// Poll a condition until it holds or a deadline passes
macro_rules! wait_for {
    ($what:expr, $cond:expr) => {{
        let mut satisfied = false;
        for _ in 0..500 {
            if $cond {
                satisfied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if !satisfied {
            panic!("timed out waiting for {}", $what);
        }
    }};
}

#[tokio::test]
async fn test_announce_crosses_link_bridge() {
    let a = Session::bind(SessionConfig::testing()).await.unwrap();
    let b = Session::bind(SessionConfig::testing()).await.unwrap();
    bridge(a.link(), b.link());

    let (_, alice) = a.create_user("@alice", "Alice", "pw").await.unwrap();

    wait_for!("alice to reach b", b.remote_users().await.contains(&alice));

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_room_and_messages_cross_link_bridge() {
    let a = Session::bind(SessionConfig::testing()).await.unwrap();
    let b = Session::bind(SessionConfig::testing()).await.unwrap();
    bridge(a.link(), b.link());

    let (alice_auth, alice) = a.create_user("@alice", "Alice", "pw").await.unwrap();
    let (bob_auth, bob) = b.create_user("@bob", "Bob", "pw").await.unwrap();

    // Each side learns the other's profile first
    wait_for!(
        "profiles to spread",
        a.remote_users().await.contains(&bob) && b.remote_users().await.contains(&alice)
    );

    // Alice starts a 1-on-1; with no explicit name it takes Bob's label
    let room = a
        .create_room(&alice_auth, None, vec![bob.id])
        .await
        .unwrap();
    assert_eq!(room.name, "Bob");
    assert!(room.is_direct());

    wait_for!("room to reach b", b.room(room.id).await.is_ok());

    // Message flows a -> b
    let sent = a
        .send_message(&alice_auth, room.id, "hello over the bridge")
        .await
        .unwrap();

    wait_for!(
        "message to reach b",
        b.room(room.id).await.map(|r| r.unread == 1).unwrap_or(false)
    );

    // Bob reads it; unread clears
    let messages = b.load_messages(&bob_auth, room.id).await.unwrap();
    assert_eq!(messages, vec![sent]);
    assert_eq!(b.room(room.id).await.unwrap().unread, 0);

    // And back the other way
    b.send_message(&bob_auth, room.id, "hi alice").await.unwrap();
    wait_for!(
        "reply to reach a",
        a.room(room.id).await.map(|r| r.unread == 1).unwrap_or(false)
    );
    let replies = a.load_messages(&alice_auth, room.id).await.unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1].content, "hi alice");

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_link_frames_applied_once() {
    let session = Session::bind(SessionConfig::testing()).await.unwrap();
    let codec = FrameCodec::new(SessionConfig::testing().max_frame_size);

    let sender = Identity::new([7u8; 32]);
    let room = Room::new("dupes", vec![sender, Identity::new([8u8; 32])]);
    let payload = codec
        .encode_payload(&Payload::RoomCreate(room.clone()))
        .unwrap();
    let frame = Frame::new(sender, 1, payload);
    let encoded = codec.encode_enveloped(&frame, Neighbour::Flood).unwrap();

    let link = session.link();
    link.give(&encoded).await.unwrap();
    link.give(&encoded).await.unwrap();

    wait_for!("room to land", session.room(room.id).await.is_ok());
    assert_eq!(session.rooms().await.len(), 1);

    session.shutdown().await;
}

#[tokio::test]
async fn test_tcp_peering_announces_users() {
    let a = Session::bind(SessionConfig::testing()).await.unwrap();
    let b = Session::bind(SessionConfig::testing()).await.unwrap();

    let (_, alice) = a.create_user("@alice", "Alice", "pw").await.unwrap();
    let (_, bob) = b.create_user("@bob", "Bob", "pw").await.unwrap();

    // Peering announces b's users to a; a's periodic announce covers the
    // other direction
    b.connect_tcp("127.0.0.1", a.local_port()).await.unwrap();

    wait_for!("bob to reach a over tcp", a.remote_users().await.contains(&bob));
    wait_for!("alice to reach b over tcp", b.remote_users().await.contains(&alice));

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_messages_cross_tcp() {
    let a = Session::bind(SessionConfig::testing()).await.unwrap();
    let b = Session::bind(SessionConfig::testing()).await.unwrap();

    let (alice_auth, _) = a.create_user("@alice", "Alice", "pw").await.unwrap();
    let (bob_auth, bob) = b.create_user("@bob", "Bob", "pw").await.unwrap();

    b.connect_tcp("127.0.0.1", a.local_port()).await.unwrap();
    wait_for!("bob to reach a", a.remote_users().await.contains(&bob));

    let room = a
        .create_room(&alice_auth, Some("wire".into()), vec![bob.id])
        .await
        .unwrap();
    a.send_message(&alice_auth, room.id, "over tcp").await.unwrap();

    wait_for!(
        "message to reach b",
        b.room(room.id).await.map(|r| r.unread == 1).unwrap_or(false)
    );
    let messages = b.load_messages(&bob_auth, room.id).await.unwrap();
    assert_eq!(messages[0].content, "over tcp");

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_user_lifecycle() {
    let session = Session::bind(SessionConfig::testing()).await.unwrap();

    let (auth, profile) = session.create_user("@alice", "Alice", "pw").await.unwrap();
    assert!(session.is_authenticated(&auth).await);
    assert_eq!(session.users().await, vec![profile.clone()]);

    // Bad password, unknown user
    assert!(matches!(
        session.login(profile.id, "wrong").await,
        Err(TangleError::Auth(_))
    ));
    assert!(session
        .login(Identity::new([9u8; 32]), "pw")
        .await
        .is_err());

    // Profile update is visible through the getter
    let updated = session
        .update_user(&auth, UserUpdate::set("@al", "Al"))
        .await
        .unwrap();
    assert_eq!(session.user(profile.id).await.unwrap(), updated);

    // Logout revokes the token for every operation
    session.logout(&auth).await.unwrap();
    assert!(!session.is_authenticated(&auth).await);
    assert!(session.create_room(&auth, None, vec![]).await.is_err());

    // A fresh login restores access
    let auth2 = session.login(profile.id, "pw").await.unwrap();
    assert!(session.is_authenticated(&auth2).await);

    session.shutdown().await;
}

#[tokio::test]
async fn test_sends_never_block_without_link_driver() {
    // Nothing drains the link endpoint here, exactly like a node whose
    // platform driver has not attached; sends must still complete once
    // the outbound queue is past capacity.
    let session = Session::bind(SessionConfig::testing()).await.unwrap();
    let (auth, _) = session.create_user("@alice", "Alice", "pw").await.unwrap();
    let room = session
        .create_room(&auth, None, vec![Identity::new([3u8; 32])])
        .await
        .unwrap();

    let sends = async {
        for n in 0..40 {
            session
                .send_message(&auth, room.id, format!("message {n}"))
                .await
                .unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(5), sends)
        .await
        .expect("sends blocked on the undrained link queue");

    session.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_room_rejected() {
    let session = Session::bind(SessionConfig::testing()).await.unwrap();
    let (auth, _) = session.create_user("@alice", "Alice", "pw").await.unwrap();

    let friend = Identity::new([3u8; 32]);
    let room = session.create_room(&auth, None, vec![friend]).await.unwrap();

    let err = session
        .create_room(&auth, None, vec![friend])
        .await
        .unwrap_err();
    match err {
        TangleError::Room(tangle_core::RoomError::Duplicate { id }) => {
            assert_eq!(id, room.id.to_string())
        }
        other => panic!("expected duplicate room, got {other}"),
    }

    session.shutdown().await;
}

#[tokio::test]
async fn test_unknown_friend_labels_fall_back_to_id() {
    let session = Session::bind(SessionConfig::testing()).await.unwrap();
    let (auth, _) = session.create_user("@alice", "Alice", "pw").await.unwrap();

    // Friend never announced; the inferred 1-on-1 name degrades to the
    // shortened identity
    let stranger = Identity::new([0xcd; 32]);
    let room = session.create_room(&auth, None, vec![stranger]).await.unwrap();
    assert_eq!(room.name, stranger.short());

    session.shutdown().await;
}

#[tokio::test]
async fn test_spoofed_remote_profile_never_shadows_local() {
    let session = Session::bind(SessionConfig::testing()).await.unwrap();
    let (_, profile) = session.create_user("@alice", "Alice", "pw").await.unwrap();
    let codec = FrameCodec::new(SessionConfig::testing().max_frame_size);

    // A frame claiming the local identity as its sender is dropped
    // outright, so the spoofed profile never lands
    let mut spoofed = profile.clone();
    spoofed.display_name = Some("Mallory".into());
    let payload = codec.encode_payload(&Payload::Announce(spoofed)).unwrap();
    let frame = Frame::new(profile.id, 99, payload);
    let encoded = codec.encode_enveloped(&frame, Neighbour::Flood).unwrap();
    session.link().give(&encoded).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.remote_users().await.is_empty());
    assert_eq!(session.user(profile.id).await.unwrap(), profile);

    session.shutdown().await;
}

#[tokio::test]
async fn test_remote_profile_via_unsigned_announce() {
    let session = Session::bind(SessionConfig::testing()).await.unwrap();
    let codec = FrameCodec::new(SessionConfig::testing().max_frame_size);

    let mut profile = UserProfile::new(Identity::new([4u8; 32]));
    profile.handle = Some("@bob".into());
    let payload = codec
        .encode_payload(&Payload::Announce(profile.clone()))
        .unwrap();
    let frame = Frame::new(profile.id, 0, payload);
    let encoded = codec.encode_enveloped(&frame, Neighbour::Flood).unwrap();
    session.link().give(&encoded).await.unwrap();

    wait_for!("profile to land", session.remote_users().await.contains(&profile));

    session.shutdown().await;
}
