//! High-level API for the persisted session record.

use crate::{SecureStorage, StorageKeys, StorageResult};
use session_types::{Session, TokenPair, User};
use tracing::warn;

/// Sole owner of the persisted session record.
///
/// The record is two string-keyed entries: the user profile JSON and the
/// token-pair JSON. Both must be present to count as a valid restore;
/// partial presence is treated as no session and cleaned up.
pub struct SessionVault {
    storage: Box<dyn SecureStorage>,
}

impl SessionVault {
    /// Create a new vault over the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Load the persisted session.
    ///
    /// Missing records, partial presence, corrupt JSON, and storage faults
    /// all yield `None`; the caller treats every failure mode as "no
    /// session". Partial or corrupt state is cleared best-effort so the next
    /// load starts clean.
    pub fn load(&self) -> Option<Session> {
        let user_json = match self.storage.get(StorageKeys::USER) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted user, treating as no session");
                return None;
            }
        };
        let token_json = match self.storage.get(StorageKeys::AUTH_TOKEN) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted tokens, treating as no session");
                return None;
            }
        };

        let (user_json, token_json) = match (user_json, token_json) {
            (Some(u), Some(t)) => (u, t),
            (None, None) => return None,
            _ => {
                warn!("Partial session record found, clearing");
                let _ = self.clear();
                return None;
            }
        };

        let user: User = match serde_json::from_str(&user_json) {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "Corrupt persisted user record, clearing");
                let _ = self.clear();
                return None;
            }
        };
        let tokens: TokenPair = match serde_json::from_str(&token_json) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "Corrupt persisted token record, clearing");
                let _ = self.clear();
                return None;
            }
        };

        Some(Session { user, tokens })
    }

    /// Persist the full session record.
    pub fn save(&self, session: &Session) -> StorageResult<()> {
        self.save_user(&session.user)?;
        self.save_tokens(&session.tokens)
    }

    /// Persist only the user profile record.
    pub fn save_user(&self, user: &User) -> StorageResult<()> {
        let json = serde_json::to_string(user)
            .map_err(|e| crate::StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::USER, &json)
    }

    /// Persist only the token-pair record.
    pub fn save_tokens(&self, tokens: &TokenPair) -> StorageResult<()> {
        let json = serde_json::to_string(tokens)
            .map_err(|e| crate::StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::AUTH_TOKEN, &json)
    }

    /// Remove the persisted session record.
    ///
    /// Idempotent: clearing an already-empty store is a no-op success.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::USER)?;
        self.storage.delete(StorageKeys::AUTH_TOKEN)?;
        Ok(())
    }
}
