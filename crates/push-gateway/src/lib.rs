//! Foreground push-notification interception for the Liftlog client.
//!
//! This crate provides:
//! - The [`PushPlatform`] seam over the platform notification service
//! - [`NotificationGateway`], which suppresses the platform's default
//!   presentation and exposes the pending notification to the UI
//! - Latest-wins buffering: at most one banner is ever shown, so a newer
//!   notification replaces an unread one

mod gateway;
mod notification;
mod platform;

pub use gateway::NotificationGateway;
pub use notification::{ForegroundDelivery, InboundNotification};
pub use platform::{ForegroundListener, ListenerId, PushPlatform, Subscription, UrlOpener};

use thiserror::Error;

/// Error type for notification handling.
#[derive(Error, Debug)]
pub enum PushError {
    /// The platform failed to open a deep link
    #[error("Failed to open link: {0}")]
    OpenUrl(String),
}

/// Result type for notification handling.
pub type PushResult<T> = Result<T, PushError>;
