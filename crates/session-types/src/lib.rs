//! Pure session data types shared across the Liftlog client crates.
//!
//! This crate holds the serialized shapes only, no I/O and no async. The
//! storage, pipeline, and session-manager crates all speak these types.

use serde::{Deserialize, Serialize};

/// A signed-in user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User UUID assigned by the backend.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Account email.
    pub email: String,
    /// Avatar file name, if one has been uploaded.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A partial user update.
///
/// Merge semantics: a `Some` field overwrites the stored value, a `None`
/// field leaves it untouched. Updating the avatar never regresses a name the
/// client already knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = Some(avatar);
        }
    }
}

/// An access/refresh token pair issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Bearer access token.
    pub token: String,
    /// Refresh token exchanged when the access token expires.
    pub refresh_token: String,
}

/// An authenticated session: the user profile plus its token pair.
///
/// A `Session` value existing is the authenticated state; there is no
/// half-authenticated form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

impl Session {
    pub fn new(user: User, tokens: TokenPair) -> Self {
        Self { user, tokens }
    }
}

/// Wire shape returned by the credential-exchange endpoint (`POST /sessions`).
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPayload {
    pub user: User,
    pub token: String,
    pub refresh_token: String,
}

impl From<SessionPayload> for Session {
    fn from(payload: SessionPayload) -> Self {
        Session {
            user: payload.user,
            tokens: TokenPair {
                token: payload.token,
                refresh_token: payload.refresh_token,
            },
        }
    }
}
