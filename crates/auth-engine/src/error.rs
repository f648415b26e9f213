//! Session lifecycle error types.

use api_pipeline::ApiError;
use secure_store::StorageError;
use thiserror::Error;

/// Error type for session lifecycle operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// API failure, propagated untouched so callers can render the typed
    /// message decided by the pipeline.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Persistence medium failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Account creation succeeded but the follow-up sign-in failed; the
    /// user should sign in manually rather than retry account creation.
    #[error("Your account was created, but signing in failed. Please sign in manually.")]
    AccountCreatedSignInFailed { source: Box<AuthError> },

    /// Operation requires an authenticated session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Invalid transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// The server answered success with an unusable body
    #[error("Malformed server response: {0}")]
    MalformedResponse(String),
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
