//! User profile and authentication carrier types

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Identity;

// ----------------------------------------------------------------------------
// User Profile
// ----------------------------------------------------------------------------

/// The externally visible part of a user
///
/// Profiles are what gets announced to peers and handed to front-ends;
/// handle and display name are both optional until the user sets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's identity (ed25519 verifying key bytes)
    pub id: Identity,
    /// Machine-friendly handle, e.g. `@alice`
    pub handle: Option<String>,
    /// Human-friendly display name
    pub display_name: Option<String>,
}

impl UserProfile {
    /// Create an empty profile for an identity
    pub fn new(id: Identity) -> Self {
        Self {
            id,
            handle: None,
            display_name: None,
        }
    }

    /// Best label for showing this user: display name, then handle,
    /// then a shortened identity
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.handle.clone())
            .unwrap_or_else(|| self.id.short())
    }
}

// ----------------------------------------------------------------------------
// Profile Updates
// ----------------------------------------------------------------------------

/// A three-state diff for a single optional field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemDiff<T> {
    /// Leave the field as it is
    Ignore,
    /// Clear the field
    Unset,
    /// Set the field to a new value
    Set(T),
}

impl<T> Default for ItemDiff<T> {
    fn default() -> Self {
        Self::Ignore
    }
}

impl<T> ItemDiff<T> {
    /// Apply this diff to a field
    pub fn apply(self, field: &mut Option<T>) {
        match self {
            Self::Ignore => {}
            Self::Unset => *field = None,
            Self::Set(value) => *field = Some(value),
        }
    }
}

/// An atomic update to a user's own profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub handle: ItemDiff<String>,
    pub display_name: ItemDiff<String>,
}

impl UserUpdate {
    /// Set both handle and display name (the common front-end operation)
    pub fn set(handle: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            handle: ItemDiff::Set(handle.into()),
            display_name: ItemDiff::Set(display_name.into()),
        }
    }

    /// Apply this update to a profile
    pub fn apply(self, profile: &mut UserProfile) {
        self.handle.apply(&mut profile.handle);
        self.display_name.apply(&mut profile.display_name);
    }
}

// ----------------------------------------------------------------------------
// Authentication
// ----------------------------------------------------------------------------

/// A session-scoped authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthToken(Uuid);

impl AuthToken {
    /// Issue a fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proof of a valid login: the user identity plus a live token
///
/// Every authenticated operation on the engine takes one of these; it is
/// issued by `create` and `login` and revoked by `logout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuth(pub Identity, pub AuthToken);

impl UserAuth {
    /// The authenticated identity
    pub fn id(&self) -> Identity {
        self.0
    }

    /// The token
    pub fn token(&self) -> AuthToken {
        self.1
    }
}
