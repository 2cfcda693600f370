//! User identity, profiles and authentication
//!
//! Users are rooted in an ed25519 keypair: the verifying key bytes are the
//! user's [`Identity`](crate::Identity). Profiles carry the mutable,
//! shareable part (handle and display name); credentials and signing keys
//! never leave the [`UserStore`].

mod profile;
mod store;

pub use profile::{AuthToken, ItemDiff, UserAuth, UserProfile, UserUpdate};
pub use store::UserStore;
