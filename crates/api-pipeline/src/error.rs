//! Typed API error taxonomy.
//!
//! Error kinds are decided once, here in the pipeline; callers match on the
//! variant instead of re-deriving the kind at each call site.

use thiserror::Error;

/// Fallback shown when the server supplied no usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Error type for API calls made through the pipeline.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The server answered with a failure; the message is surfaced verbatim
    /// when the response body carried one.
    #[error("{message}")]
    Server {
        /// HTTP status of the failing response.
        status: u16,
        /// User-facing message (server-supplied, or the generic fallback).
        message: String,
    },

    /// The refresh token itself was rejected; the session has been torn down.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    /// No usable response from the server. The payload carries transport
    /// detail for logs; the display message stays generic.
    #[error("Could not reach the server. Please check your connection.")]
    Network(String),

    /// An authorized request was issued without an authenticated session.
    #[error("Not authenticated")]
    NotAuthenticated,
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
