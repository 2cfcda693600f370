//! In-memory user store
//!
//! Holds local users (profile, credential hash, signing key, live tokens)
//! and remote users (profiles learned from announcements). Credential
//! hashes and signing keys are private to this module.

use std::collections::HashMap;

use ed25519_dalek::{Signer, SigningKey};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{AuthError, Result, TangleError};
use crate::types::Identity;
use crate::users::{AuthToken, UserAuth, UserProfile, UserUpdate};

const SALT_LEN: usize = 16;

// ----------------------------------------------------------------------------
// Local User Record
// ----------------------------------------------------------------------------

/// A user whose keys live on this node
struct LocalUser {
    profile: UserProfile,
    signing_key: SigningKey,
    salt: [u8; SALT_LEN],
    credential_hash: [u8; 32],
}

impl LocalUser {
    fn verify_password(&self, password: &str) -> bool {
        hash_credential(&self.salt, password) == self.credential_hash
    }
}

fn hash_credential(salt: &[u8; SALT_LEN], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

// ----------------------------------------------------------------------------
// User Store
// ----------------------------------------------------------------------------

/// In-memory store of local and remote users
#[derive(Default)]
pub struct UserStore {
    local: HashMap<Identity, LocalUser>,
    remote: HashMap<Identity, UserProfile>,
    tokens: HashMap<AuthToken, Identity>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new local user with a credential, returning a live auth
    /// and the initial profile
    ///
    /// The identity is the verifying key of a freshly generated ed25519
    /// keypair.
    pub fn create(
        &mut self,
        handle: impl Into<String>,
        display_name: impl Into<String>,
        password: &str,
    ) -> Result<(UserAuth, UserProfile)> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let id = Identity::new(signing_key.verifying_key().to_bytes());

        if self.local.contains_key(&id) {
            return Err(TangleError::Auth(AuthError::UserExists));
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let credential_hash = hash_credential(&salt, password);

        let mut profile = UserProfile::new(id);
        UserUpdate::set(handle, display_name).apply(&mut profile);

        self.local.insert(
            id,
            LocalUser {
                profile: profile.clone(),
                signing_key,
                salt,
                credential_hash,
            },
        );

        // Creation implies a login
        let token = AuthToken::generate();
        self.tokens.insert(token, id);

        debug!(user = %id, "created local user");
        Ok((UserAuth(id, token), profile))
    }

    /// Log in as an existing local user, issuing a fresh token
    pub fn login(&mut self, id: Identity, password: &str) -> Result<UserAuth> {
        let user = self
            .local
            .get(&id)
            .ok_or_else(|| TangleError::unknown_user(id))?;

        if !user.verify_password(password) {
            return Err(TangleError::invalid_credentials(id));
        }

        let token = AuthToken::generate();
        self.tokens.insert(token, id);
        debug!(user = %id, "login");
        Ok(UserAuth(id, token))
    }

    /// Revoke the token behind an auth
    pub fn logout(&mut self, auth: &UserAuth) -> Result<()> {
        self.authenticate(auth)?;
        self.tokens.remove(&auth.token());
        debug!(user = %auth.id(), "logout");
        Ok(())
    }

    /// Check whether an auth still refers to a live login
    pub fn is_authenticated(&self, auth: &UserAuth) -> bool {
        self.tokens.get(&auth.token()) == Some(&auth.id())
    }

    /// Validate an auth, returning the authenticated identity
    pub fn authenticate(&self, auth: &UserAuth) -> Result<Identity> {
        if self.is_authenticated(auth) {
            Ok(auth.id())
        } else {
            Err(TangleError::Auth(AuthError::NotAuthenticated))
        }
    }

    /// Get a profile by identity, local or remote
    pub fn get(&self, id: Identity) -> Result<UserProfile> {
        self.local
            .get(&id)
            .map(|user| user.profile.clone())
            .or_else(|| self.remote.get(&id).cloned())
            .ok_or_else(|| TangleError::unknown_user(id))
    }

    /// Apply an update to the authenticated user's own profile,
    /// returning the new profile
    pub fn update(&mut self, auth: &UserAuth, update: UserUpdate) -> Result<UserProfile> {
        let id = self.authenticate(auth)?;
        let user = self
            .local
            .get_mut(&id)
            .ok_or_else(|| TangleError::unknown_user(id))?;

        update.apply(&mut user.profile);
        Ok(user.profile.clone())
    }

    /// List local user profiles
    pub fn list(&self) -> Vec<UserProfile> {
        self.local.values().map(|u| u.profile.clone()).collect()
    }

    /// List profiles learned from the network
    pub fn list_remote(&self) -> Vec<UserProfile> {
        self.remote.values().cloned().collect()
    }

    /// Whether an identity belongs to a local user
    pub fn is_local(&self, id: Identity) -> bool {
        self.local.contains_key(&id)
    }

    /// Record a profile announced by a peer
    ///
    /// Announcements for local identities are ignored; a later
    /// announcement replaces an earlier one.
    pub fn upsert_remote(&mut self, profile: UserProfile) {
        if self.local.contains_key(&profile.id) {
            return;
        }
        debug!(user = %profile.id, label = %profile.label(), "remote profile");
        self.remote.insert(profile.id, profile);
    }

    /// Sign a message with the authenticated user's key
    pub fn sign(&self, auth: &UserAuth, message: &[u8]) -> Result<[u8; 64]> {
        let id = self.authenticate(auth)?;
        self.sign_local(id, message)
    }

    /// Sign a message as a local identity without an auth
    ///
    /// For engine-originated frames such as periodic announcements. The
    /// identity must be local; callers never reach remote keys here.
    pub fn sign_local(&self, id: Identity, message: &[u8]) -> Result<[u8; 64]> {
        let user = self
            .local
            .get(&id)
            .ok_or_else(|| TangleError::unknown_user(id))?;
        Ok(user.signing_key.sign(message).to_bytes())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_login() {
        let mut store = UserStore::new();
        let (auth, profile) = store.create("@alice", "Alice", "hunter2").unwrap();

        assert_eq!(profile.handle.as_deref(), Some("@alice"));
        assert!(store.is_authenticated(&auth));

        // A second login issues a distinct, also-valid token
        let auth2 = store.login(profile.id, "hunter2").unwrap();
        assert_ne!(auth.token(), auth2.token());
        assert!(store.is_authenticated(&auth2));
    }

    #[test]
    fn test_login_failures() {
        let mut store = UserStore::new();
        let (_, profile) = store.create("@alice", "Alice", "hunter2").unwrap();

        assert!(matches!(
            store.login(profile.id, "wrong"),
            Err(TangleError::Auth(AuthError::InvalidCredentials { .. }))
        ));
        assert!(matches!(
            store.login(Identity::new([9u8; 32]), "hunter2"),
            Err(TangleError::Auth(AuthError::UnknownUser { .. }))
        ));
    }

    #[test]
    fn test_logout_revokes_token() {
        let mut store = UserStore::new();
        let (auth, _) = store.create("@alice", "Alice", "pw").unwrap();

        store.logout(&auth).unwrap();
        assert!(!store.is_authenticated(&auth));

        // Operations with the stale auth fail
        assert!(matches!(
            store.update(&auth, UserUpdate::set("@a", "A")),
            Err(TangleError::Auth(AuthError::NotAuthenticated))
        ));
    }

    #[test]
    fn test_update_returns_new_profile() {
        let mut store = UserStore::new();
        let (auth, _) = store.create("@alice", "Alice", "pw").unwrap();

        let updated = store.update(&auth, UserUpdate::set("@al", "Al")).unwrap();
        assert_eq!(updated.handle.as_deref(), Some("@al"));
        assert_eq!(store.get(auth.id()).unwrap(), updated);
    }

    #[test]
    fn test_remote_profiles() {
        let mut store = UserStore::new();
        let (auth, local_profile) = store.create("@alice", "Alice", "pw").unwrap();

        let mut remote = UserProfile::new(Identity::new([3u8; 32]));
        remote.display_name = Some("Bob".into());
        store.upsert_remote(remote.clone());

        assert_eq!(store.get(remote.id).unwrap(), remote);
        assert_eq!(store.list_remote().len(), 1);
        assert_eq!(store.list().len(), 1);

        // Announcements never shadow local users
        let mut spoofed = local_profile.clone();
        spoofed.display_name = Some("Mallory".into());
        store.upsert_remote(spoofed);
        assert_eq!(store.get(auth.id()).unwrap(), local_profile);
    }

    #[test]
    fn test_signatures_verify_against_identity() {
        use ed25519_dalek::{Signature, Verifier, VerifyingKey};

        let mut store = UserStore::new();
        let (auth, profile) = store.create("@alice", "Alice", "pw").unwrap();

        let message = b"frame body";
        let sig_bytes = store.sign(&auth, message).unwrap();

        let key = VerifyingKey::from_bytes(profile.id.as_bytes()).unwrap();
        let signature = Signature::from_bytes(&sig_bytes);
        assert!(key.verify(message, &signature).is_ok());
        assert!(key.verify(b"other body", &signature).is_err());
    }
}
