//! Seam between the pipeline and the session owner.

use async_trait::async_trait;
use session_types::TokenPair;

/// How the pipeline sees the session owner.
///
/// Implemented by the session manager. The pipeline never touches storage
/// directly; token rotation and teardown both go through this bridge so the
/// session owner stays the only writer.
#[async_trait]
pub trait SessionBridge: Send + Sync {
    /// Current access token, if a session is held.
    fn access_token(&self) -> Option<String>;

    /// Current refresh token, if a session is held.
    fn refresh_token(&self) -> Option<String>;

    /// Adopt a rotated token pair.
    ///
    /// Must be a no-op when no session is held: a refresh that settles after
    /// sign-out must not resurrect the session.
    async fn tokens_refreshed(&self, tokens: TokenPair);

    /// The refresh token was rejected; tear the session down.
    async fn session_expired(&self);
}
