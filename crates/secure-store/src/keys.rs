//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Persisted user profile (JSON)
    pub const USER: &'static str = "liftlog.user";

    /// Persisted token pair (JSON)
    pub const AUTH_TOKEN: &'static str = "liftlog.auth_token";
}
